//! The widget driver: owns the timer and runs every trigger (ticks, periodic
//! saves, the post-cycle hold, inbound commands) on one cooperative loop, so
//! handlers never overlap and need no locking.

use std::future::{Future, pending};
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep};
use tracing::{debug, info};

use crate::cue::{Cue, CuePlayer, play_cue};
use crate::events::Command;
use crate::persistence::{SnapshotWriter, load_snapshot};
use crate::pomodoro::phase::{CYCLE_COMPLETE_HOLD_MS, SAVE_INTERVAL_MS, TICK_INTERVAL_MS};
use crate::pomodoro::{Completion, ForcedPhase, Phase, PomodoroConfig, Timer, reconcile};
use crate::render::{Animation, RenderFrame, RenderSink};
use crate::store::SharedStore;

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One-off decorations for the next frame.
#[derive(Debug, Default, Clone, Copy)]
struct Effects {
    animation: Option<Animation>,
    cue: Option<Cue>,
}

pub struct Widget<C: Clock = SystemClock> {
    config: PomodoroConfig,
    timer: Timer,
    clock: C,
    sinks: Vec<Box<dyn RenderSink>>,
    cues: Box<dyn CuePlayer>,
    writer: SnapshotWriter,
    writer_task: JoinHandle<()>,
    ticker: Option<Interval>,
    cycle_hold: Option<Pin<Box<Sleep>>>,
}

impl<C: Clock> Widget<C> {
    /// Restore the last snapshot (if any) and draw the first frame.
    pub async fn load(
        config: PomodoroConfig,
        store: SharedStore,
        clock: C,
        sinks: Vec<Box<dyn RenderSink>>,
        cues: Box<dyn CuePlayer>,
    ) -> Self {
        let now = clock.now();
        let timer = match load_snapshot(&store).await {
            Some(snapshot) => {
                let timer = reconcile(&snapshot, &config, now);
                info!(
                    mode = timer.phase().as_str(),
                    session = timer.session_index(),
                    remaining = timer.remaining_seconds(),
                    paused = timer.is_paused(),
                    "Timer state restored"
                );
                timer
            }
            None => Timer::new(&config),
        };

        let (writer, writer_task) = SnapshotWriter::spawn(store);
        let mut widget = Self {
            config,
            timer,
            clock,
            sinks,
            cues,
            writer,
            writer_task,
            ticker: None,
            cycle_hold: None,
        };
        widget.render(Effects::default());
        widget
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Drive the widget until `commands` closes or `shutdown` resolves.
    pub async fn run<F>(mut self, mut commands: mpsc::UnboundedReceiver<Command>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let save_every = Duration::from_millis(SAVE_INTERVAL_MS);
        let mut save_interval = interval_at(Instant::now() + save_every, save_every);
        tokio::pin!(shutdown);

        info!(
            "{} Starting in {} mode",
            self.timer.phase().emoji(),
            self.config.title(self.timer.phase())
        );

        loop {
            tokio::select! {
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                _ = hold_elapsed(&mut self.cycle_hold) => self.on_cycle_hold_elapsed(),
                _ = save_interval.tick() => self.save(),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        info!("Command channel closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Save one last snapshot and wait for the writer to drain.
    pub async fn shutdown(self) {
        let snapshot = self.timer.snapshot(self.clock.now());
        self.writer.save(snapshot);
        let Self {
            writer,
            writer_task,
            ..
        } = self;
        drop(writer);
        if let Err(e) = writer_task.await {
            tracing::error!(error = %e, "Snapshot writer task failed");
        }
    }

    pub fn handle(&mut self, command: Command) {
        let now = self.clock.now();
        let mut effects = Effects::default();

        match command {
            Command::Start => {
                if !self.timer.start(now) {
                    return;
                }
                info!("Timer started: {} mode", self.timer.phase().as_str());
                self.save();
            }
            Command::Pause => {
                if !self.timer.pause(now) {
                    return;
                }
                info!(remaining = self.timer.remaining_seconds(), "Timer paused");
                self.save();
            }
            Command::Reset => {
                self.cycle_hold = None;
                self.timer.reset(&self.config);
                info!("Timer reset");
                self.save();
            }
            Command::ForceCompleteWork => {
                info!("Testing work complete");
                let completion = self.timer.force_complete(ForcedPhase::Work, &self.config);
                effects = self.on_completion(Phase::Work, completion);
            }
            Command::ForceCompleteBreak => {
                info!("Testing break complete");
                let completion = self.timer.force_complete(ForcedPhase::Break, &self.config);
                effects = self.on_completion(Phase::ShortBreak, completion);
            }
            Command::AdvanceSession => {
                self.timer.advance_session(&self.config);
                info!(session = self.timer.session_index(), "Testing session change");
                self.save();
            }
        }

        self.sync_ticker();
        self.render(effects);
    }

    fn on_tick(&mut self) {
        let now = self.clock.now();
        let finished = self.timer.phase();
        let effects = match self.timer.tick(&self.config, now) {
            Some(completion) => self.on_completion(finished, completion),
            None if self.config.enable_sound() => {
                play_cue(self.cues.as_mut(), Cue::Tick);
                Effects {
                    cue: Some(Cue::Tick),
                    ..Effects::default()
                }
            }
            None => Effects::default(),
        };
        self.sync_ticker();
        self.render(effects);
    }

    fn on_completion(&mut self, finished: Phase, completion: Completion) -> Effects {
        let cue = self.config.enable_sound().then(|| Cue::for_finished(finished));
        if let Some(cue) = cue {
            play_cue(self.cues.as_mut(), cue);
        }

        let animation = match completion {
            Completion::PhaseChanged { finished, next } => {
                info!(
                    "{} {} completed, switched to {}",
                    next.emoji(),
                    finished.as_str(),
                    next.as_str()
                );
                self.cycle_hold = None;
                Animation::Pulse
            }
            Completion::CycleComplete => {
                info!("All Pomodoro sessions completed!");
                self.cycle_hold = Some(Box::pin(sleep(Duration::from_millis(
                    CYCLE_COMPLETE_HOLD_MS,
                ))));
                Animation::Shake
            }
        };

        self.save();
        Effects {
            animation: Some(animation),
            cue,
        }
    }

    fn on_cycle_hold_elapsed(&mut self) {
        self.cycle_hold = None;
        self.timer.finish_cycle(&self.config);
        debug!("Starting a new cycle");
        self.save();
        self.sync_ticker();
        self.render(Effects::default());
    }

    /// Keep exactly one tick cadence alive while running and none otherwise.
    fn sync_ticker(&mut self) {
        if !self.timer.is_running() {
            self.ticker = None;
        } else if self.ticker.is_none() {
            let every = Duration::from_millis(TICK_INTERVAL_MS);
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            self.ticker = Some(ticker);
        }
    }

    fn save(&self) {
        self.writer.save(self.timer.snapshot(self.clock.now()));
    }

    fn render(&mut self, effects: Effects) {
        let mut frame = RenderFrame::new(&self.timer, &self.config).with_cue(effects.cue);
        if let Some(animation) = effects.animation {
            frame = frame.with_animation(animation);
        }
        for sink in &mut self.sinks {
            sink.render(&frame);
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn hold_elapsed(hold: &mut Option<Pin<Box<Sleep>>>) {
    match hold {
        Some(hold) => hold.as_mut().await,
        None => pending::<()>().await,
    }
}
