use anyhow::Context;
use clap::Parser;
use generator::source::SyntheticRadar;
use generator::template::Scenario;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::ResultsModel;
use presencecore::Session;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic radar driver for the presence-sensing core")]
struct Args {
    /// Run the frames through every detector synchronously and report
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Scenario::Walker)]
    scenario: Scenario,
    /// Acquisitions per offline run
    #[arg(long, default_value_t = 40)]
    frames: u64,
    /// Start a live session and serve its results over HTTP until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,
}

fn run_offline(config: &WorkflowConfig) -> anyhow::Result<()> {
    let result = Runner::new(config.clone()).execute()?;

    println!(
        "Offline run -> frames {} (dropped {}), falls {:?}, max people {}, gesture frames {}, postures {:?}",
        result.frames_processed,
        result.frames_dropped,
        result.fall_frames,
        result.max_people,
        result.gesture_frames,
        result.postures
    );
    if let Some(angle) = result.last.angle {
        println!(
            "Last angle -> {:.1} deg (segment {})",
            angle.smoothed_angle_deg, angle.active_segment
        );
    }

    let report = serde_json::to_string(&result).context("serializing offline report")?;
    let report_path = PathBuf::from("tools/data/offline_report.log");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report_path)
        .with_context(|| format!("opening {}", report_path.display()))?;
    writeln!(file, "{}", report)?;
    Ok(())
}

async fn run_live(config: WorkflowConfig, bind: SocketAddr) -> anyhow::Result<()> {
    let mut generator = config.generator.clone();
    generator.realtime = true;
    let source = SyntheticRadar::new(config.session.frame.clone(), generator, None)?;
    let session = Session::start(source, &config.session).context("starting session")?;

    let bridge = GuiBridge::new(session.fall_reset_handle());
    let server = bridge.serve(bind)?;
    println!("HTTP bridge on http://{} (Ctrl+C to stop)...", server.addr());

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut refresh = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("awaiting Ctrl+C to exit")?;
                break;
            }
            _ = refresh.tick() => {
                bridge.publish(ResultsModel::capture(&session));
                if !session.is_acquiring() {
                    log::warn!("[simulator] acquisition ended");
                    break;
                }
            }
        }
    }

    server.shutdown().await;
    session.shutdown().await.context("session ended with an error")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.scenario, args.frames)
    };

    if args.offline || !args.serve {
        run_offline(&workflow_config)?;
    }
    if args.serve {
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for the live session")?;
        runtime.block_on(run_live(workflow_config, args.bind))?;
    }

    Ok(())
}
