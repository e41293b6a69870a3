use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use flowmodal_core::markup::STEP_TAG;
use flowmodal_core::{parse_duration, ClickArea, Config, Element, Flow, FlowBuilder, Node};
use tracing::debug;

#[derive(Subcommand)]
pub enum FlowAction {
    /// Print the rendered flow as JSON
    Status {
        /// Markup file (TOML)
        markup: PathBuf,
        /// Include the persisted state
        #[arg(long)]
        persisted: bool,
    },
    /// Hide a step's modal behind its badge
    Hide {
        markup: PathBuf,
        /// Step index
        step: usize,
    },
    /// Bring a hidden step's modal back
    Show {
        markup: PathBuf,
        /// Step index
        step: usize,
    },
    /// Click an area of a step or badge
    Click {
        markup: PathBuf,
        /// Target node: "step:N" or "badge:N"
        node: String,
        /// backdrop, hide-icon, content, hint or button
        area: ClickArea,
    },
    /// Re-evaluate the flow, optionally wiping stored progress
    Refresh {
        markup: PathBuf,
        /// Restart from the beginning
        #[arg(long)]
        force: bool,
    },
    /// Mark a step ready (or not) in the markup file
    Ready {
        markup: PathBuf,
        /// Step index
        step: usize,
        /// Clear the ready flag instead
        #[arg(long)]
        unset: bool,
    },
    /// Drive timers and print signals as JSON lines
    Watch {
        markup: PathBuf,
        /// Stop after this long (e.g. "30s", "5m")
        #[arg(long = "for")]
        limit: Option<String>,
    },
}

/// Mount the flow described by `markup`, persisting through the configured
/// storage tiers.
fn mount(config: &Config, element: &mut Element) -> Result<Flow, Box<dyn std::error::Error>> {
    element
        .attributes
        .entry("storages".to_string())
        .or_insert_with(|| config.storage.tiers.join(","));
    let flow = FlowBuilder::from_element(element)?
        .database(config.database_path()?)
        .build()?;
    debug!(steps = flow.len(), active = ?flow.activated_step_index(), "flow mounted");
    Ok(flow)
}

fn load(path: &Path) -> Result<(Config, Element), Box<dyn std::error::Error>> {
    Ok((Config::load()?, Element::load(path)?))
}

fn parse_node(value: &str) -> Result<Node, Box<dyn std::error::Error>> {
    let (kind, index) = value
        .split_once(':')
        .ok_or_else(|| format!("invalid node: {value} (expected step:N or badge:N)"))?;
    let index: usize = index.trim().parse()?;
    match kind.trim() {
        "step" => Ok(Node::Step(index)),
        "badge" => Ok(Node::Badge(index)),
        other => Err(format!("invalid node kind: {other}").into()),
    }
}

fn print_view(flow: &Flow) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&flow.render())?);
    Ok(())
}

pub fn run(action: FlowAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        FlowAction::Status { markup, persisted } => {
            let (config, mut element) = load(&markup)?;
            let mut flow = mount(&config, &mut element)?;
            if persisted {
                let json = serde_json::json!({
                    "view": flow.render(),
                    "persisted": flow.persisted()?,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                print_view(&flow)?;
            }
        }
        FlowAction::Hide { markup, step } => {
            let (config, mut element) = load(&markup)?;
            let mut flow = mount(&config, &mut element)?;
            flow.hide_modal(step)?;
            print_view(&flow)?;
        }
        FlowAction::Show { markup, step } => {
            let (config, mut element) = load(&markup)?;
            let mut flow = mount(&config, &mut element)?;
            flow.show_modal(step)?;
            print_view(&flow)?;
        }
        FlowAction::Click { markup, node, area } => {
            let node = parse_node(&node)?;
            let (config, mut element) = load(&markup)?;
            let mut flow = mount(&config, &mut element)?;
            if !flow.click(node, area)? {
                eprintln!("nothing clickable at {node} {}", area.as_str());
            }
            print_view(&flow)?;
        }
        FlowAction::Refresh { markup, force } => {
            let (config, mut element) = load(&markup)?;
            let mut flow = mount(&config, &mut element)?;
            flow.refresh_state(force)?;
            print_view(&flow)?;
        }
        FlowAction::Ready {
            markup,
            step,
            unset,
        } => {
            let (config, mut element) = load(&markup)?;
            let target = element
                .children
                .iter_mut()
                .filter(|c| c.tag == STEP_TAG)
                .nth(step)
                .ok_or_else(|| format!("no <{STEP_TAG}> at index {step}"))?;
            if unset {
                target.attributes.remove("ready");
            } else {
                target.attributes.insert("ready".into(), "true".into());
            }
            std::fs::write(&markup, element.to_toml()?)?;

            let flow = mount(&config, &mut element)?;
            print_view(&flow)?;
        }
        FlowAction::Watch { markup, limit } => {
            let limit_ms = limit
                .as_deref()
                .map(|v| parse_duration(v).ok_or_else(|| format!("invalid duration: {v}")))
                .transpose()?;
            let (config, mut element) = load(&markup)?;
            let mut flow = mount(&config, &mut element)?;
            watch(&mut flow, config.run.tick_interval_ms, limit_ms)?;
        }
    }
    Ok(())
}

/// Tick until `limit_ms` passes. Without a limit, stop once no timer is
/// armed.
fn watch(
    flow: &mut Flow,
    interval_ms: u64,
    limit_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let interval = Duration::from_millis(interval_ms.max(1));
    let started = std::time::Instant::now();

    loop {
        for envelope in flow.take_events() {
            println!("{}", serde_json::to_string(&envelope)?);
        }
        let done = match limit_ms {
            Some(limit) => started.elapsed() >= Duration::from_millis(limit),
            None => flow.next_deadline().is_none(),
        };
        if done {
            break;
        }
        std::thread::sleep(interval);
        flow.tick()?;
    }
    Ok(())
}
