use revu::api::{ApiClient, ResultItem};
use revu::cli::{Args, parse_object_filter};
use revu::core::events::{Key, KeyDown, TimelinePointerMoved};
use revu::core::hover::HoverConfig;
use revu::core::modal::{ModalConfig, ModalPlayerController};
use revu::core::sink::{MediaSink, SharedSink, SinkFactory, forward_sink_events};
use revu::core::stage::SharedStage;
use revu::core::bus::EventBus;
use revu::core::stream::StreamSessionManager;
use revu::paths::{self, PathConfig};
use revu::query::{FilterSet, count_label};
use revu::results::ResultsModel;
use revu::sim::{SimSink, SimStage, SimStreamingClient};
use revu::store::SessionStore;

use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();

    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    debug!("Command-line args: {:?}", args);

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    if args.demo {
        return run_demo();
    }

    let client = ApiClient::new(&args.server);
    let store = SessionStore::new(&path_config);

    if args.login {
        let session = client.login()?;
        store.save(&session)?;
        println!("Logged in: evaluation {}", session.evaluation_id);
    }

    let Some(description) = args.query.clone() else {
        if !args.login {
            info!("nothing to do: no query, no --login, no --demo");
        }
        return Ok(());
    };

    let mut filters = FilterSet::new();
    for spec in &args.objects {
        let object = parse_object_filter(spec).map_err(anyhow::Error::msg)?;
        if let Err(e) = filters.add(object) {
            bail!("{spec}: {e}");
        }
    }
    for object in filters.objects() {
        println!(
            "filter: {}  {}  confidence >= {}",
            object.label,
            count_label(object),
            object.confidence
        );
    }
    let query = filters.build_query(&description, &args.audio);

    // Result list over the simulated runtime; a real host injects its own
    // sinks, streaming client and stage.
    let sessions = Arc::new(Mutex::new(StreamSessionManager::new(Box::new(
        SimStreamingClient::supported(),
    ))));
    let sinks: SinkFactory = Box::new(|| Arc::new(Mutex::new(SimSink::new())));
    let mut results = ResultsModel::new(sessions, sinks, HoverConfig::default());

    let count = results.search(&client, &query)?;
    println!("{count} result(s)");
    for (i, card) in results.cards().iter().enumerate() {
        let score = card
            .item
            .clip_score
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:3}  {}  kf {:5}  score {}  {}",
            i,
            card.media.video_id(),
            card.item.keyframe_index,
            score,
            card.thumbnail
        );
    }

    if let Some(index) = args.submit {
        let response = results.submit(&client, &store, index)?;
        println!("Submitted: {response}");
    }

    Ok(())
}

/// Scripted end-to-end run on the simulated runtime: hover a result card,
/// open it in the modal, play, scrub for a thumbnail, step a frame and close.
fn run_demo() -> Result<()> {
    println!("revu demo: simulated review session");

    let bus = EventBus::new();
    let sim_stage = Arc::new(Mutex::new(SimStage::with_bounds(0.0, 400.0)));
    let stage: SharedStage = sim_stage.clone();

    let mut primary_sink = SimSink::new();
    primary_sink.set_duration(120.0);
    let primary = Arc::new(Mutex::new(primary_sink));
    let primary_shared: SharedSink = primary.clone();

    let sessions = Arc::new(Mutex::new(StreamSessionManager::new(Box::new(
        SimStreamingClient::supported(),
    ))));

    // Hidden sinks are created on demand; the demo loop keeps handles so it
    // can advance their simulated time and drain their events.
    let spawned: Arc<Mutex<Vec<Arc<Mutex<SimSink>>>>> = Arc::new(Mutex::new(Vec::new()));
    let hover_sinks: SinkFactory = sink_factory(&spawned);
    let capture_sinks: SinkFactory = sink_factory(&spawned);

    let mut results = ResultsModel::new(sessions.clone(), hover_sinks, HoverConfig::default());
    let mut modal = ModalPlayerController::new(
        ModalConfig::default(),
        bus.clone(),
        stage.clone(),
        primary_shared.clone(),
        sessions.clone(),
        capture_sinks,
    );

    results.set_results(vec![
        ResultItem {
            video_id: "v101".to_string(),
            keyframe_index: 250,
            fps: Some(25.0),
            clip_score: Some(0.92),
        },
        ResultItem {
            video_id: "v204".to_string(),
            keyframe_index: 40,
            fps: Some(30.0),
            clip_score: Some(0.87),
        },
    ]);
    println!("loaded {} result cards", results.len());

    // 1. Hover the first card until the debounce fires
    results.pointer_enter(0);
    for _ in 0..6 {
        std::thread::sleep(Duration::from_millis(50));
        results.tick();
        pump_sim_sinks(&bus, &spawned);
    }
    println!(
        "hover preview active: {} (streaming sessions: {})",
        results.cards()[0].hover_active(),
        sessions.lock().unwrap_or_else(|e| e.into_inner()).active_sessions()
    );
    results.pointer_leave(0);
    println!(
        "pointer left, streaming sessions: {}",
        sessions.lock().unwrap_or_else(|e| e.into_inner()).active_sessions()
    );

    // 2. Open the card in the modal and let it play for a second
    results.open_in_modal(&mut modal, 0);
    for _ in 0..10 {
        primary.lock().unwrap_or_else(|e| e.into_inner()).tick(0.1);
        forward_sink_events(&bus, &primary_shared);
        pump_sim_sinks(&bus, &spawned);
        modal.tick();
    }
    {
        let stage = sim_stage.lock().unwrap_or_else(|e| e.into_inner());
        println!("{}", stage.title());
        println!("{} | progress {:.1}%", stage.frame_info(), stage.progress_percent());
    }

    // 3. Scrub the timeline: throttled capture produces a thumbnail
    bus.emit(&TimelinePointerMoved { x: 200.0 });
    std::thread::sleep(Duration::from_millis(80));
    modal.tick();
    pump_sim_sinks(&bus, &spawned);
    modal.tick();
    {
        let stage = sim_stage.lock().unwrap_or_else(|e| e.into_inner());
        println!(
            "scrub at {} -> thumbnail: {}",
            stage.time_label(),
            stage.preview_image().map(|img| format!("{} bytes", img.data.len())).unwrap_or_else(|| "none".to_string())
        );
    }

    // 4. Frame stepping and play/pause via keys
    bus.emit(&KeyDown { key: Key::ArrowRight });
    modal.pump();
    primary.lock().unwrap_or_else(|e| e.into_inner()).tick(0.0);
    forward_sink_events(&bus, &primary_shared);
    println!(
        "stepped one frame: position {:.3}s (paused: {})",
        primary.lock().unwrap_or_else(|e| e.into_inner()).current_time(),
        primary.lock().unwrap_or_else(|e| e.into_inner()).is_paused()
    );
    bus.emit(&KeyDown { key: Key::Space });
    modal.pump();

    // 5. Escape closes; everything is torn down
    bus.emit(&KeyDown { key: Key::Escape });
    modal.pump();
    println!(
        "closed: modal open {}, overlay widgets {}, streaming sessions {}",
        modal.is_open(),
        sim_stage.lock().unwrap_or_else(|e| e.into_inner()).widget_count(),
        sessions.lock().unwrap_or_else(|e| e.into_inner()).active_sessions()
    );

    Ok(())
}

/// Factory returning sinks registered in `spawned` for demo-loop pumping.
fn sink_factory(spawned: &Arc<Mutex<Vec<Arc<Mutex<SimSink>>>>>) -> SinkFactory {
    let spawned = Arc::clone(spawned);
    Box::new(move || {
        let mut sink = SimSink::new();
        sink.set_duration(120.0);
        let sink = Arc::new(Mutex::new(sink));
        spawned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&sink));
        sink
    })
}

/// Advance every spawned hidden sink and forward its completion events.
fn pump_sim_sinks(bus: &EventBus, spawned: &Arc<Mutex<Vec<Arc<Mutex<SimSink>>>>>) {
    let sinks: Vec<Arc<Mutex<SimSink>>> = spawned
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .map(Arc::clone)
        .collect();
    for sink in sinks {
        sink.lock().unwrap_or_else(|e| e.into_inner()).tick(0.0);
        let shared: SharedSink = sink.clone();
        forward_sink_events(bus, &shared);
    }
}
