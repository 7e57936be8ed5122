//! Countdown engine and work/break cycle state machine.
//!
//! The tick source lives in the REPL loop; everything here is pure state.
//! Each command or tick returns a list of [`Effect`]s (display, notification
//! and sound requests) for the caller to execute, so the whole cycle logic
//! can be driven and inspected in tests without real timers or I/O.

use crate::config::Durations;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }

    pub fn is_work(self) -> bool {
        matches!(self, Phase::Work)
    }
}

/// One countdown from a nominal duration to exhaustion.
///
/// The nominal duration is captured at [`SessionClock::begin`] time, so a
/// settings change never touches a session already underway. Remaining time
/// dips to -1 on the final tick: a clock of duration `d` ticks `d + 1` times,
/// and the display reaches 00:00 on the tick that ends the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    phase: Phase,
    nominal_secs: u64,
    remaining: i64,
    ticking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    Counting { remaining: u64 },
    Finished { remaining: u64 },
}

impl SessionClock {
    pub fn begin(phase: Phase, duration_secs: u64) -> Self {
        Self {
            phase,
            nominal_secs: duration_secs,
            remaining: duration_secs as i64,
            ticking: true,
        }
    }

    /// Report the value to display, then count down. Finishing stops the
    /// clock for good.
    pub fn tick(&mut self) -> ClockTick {
        let remaining = self.remaining_secs();
        self.remaining -= 1;
        if self.remaining < 0 {
            self.ticking = false;
            ClockTick::Finished { remaining }
        } else {
            ClockTick::Counting { remaining }
        }
    }

    /// Stop ticking without finishing. Safe to call repeatedly.
    pub fn halt(&mut self) {
        self.ticking = false;
    }

    /// Continue from the retained remaining time.
    pub fn resume(&mut self) {
        self.ticking = true;
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn nominal_secs(&self) -> u64 {
        self.nominal_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining.max(0) as u64
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.nominal_secs - self.remaining_secs()
    }
}

/// Running totals since the last reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub completed_work_sessions: u32,
    pub work_secs: u64,
    pub break_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
}

/// Side-effect requests produced by a transition. The REPL turns these into
/// console output, desktop notifications and sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Countdown { phase: Phase, remaining: u64 },
    SessionStarted { phase: Phase, duration: u64 },
    SessionEnded { phase: Phase },
    SessionPaused { phase: Phase },
    SessionResumed { phase: Phase },
    SessionStopped { phase: Phase },
    CycleReset,
    Rejected { reason: &'static str },
}

/// Sequencing policy: which session follows a finished one.
fn next_phase(finished: Phase, completed_work_sessions: u32, sessions_before_long_break: u32) -> Phase {
    match finished {
        Phase::Work if completed_work_sessions % sessions_before_long_break == 0 => Phase::LongBreak,
        Phase::Work => Phase::ShortBreak,
        Phase::ShortBreak | Phase::LongBreak => Phase::Work,
    }
}

/// Sequences Work -> (Short|Long) Break -> Work and applies the user
/// commands to the single live session.
///
/// Idle/Running/Paused is derived from the clock slot, so the "running and
/// paused at once" state cannot be represented. Holding at most one clock is
/// also what guarantees at most one countdown exists at a time.
pub struct CycleController {
    durations: Durations,
    totals: Totals,
    clock: Option<SessionClock>,
}

impl CycleController {
    pub fn new(durations: Durations) -> Self {
        Self {
            durations,
            totals: Totals::default(),
            clock: None,
        }
    }

    pub fn state(&self) -> RunState {
        match &self.clock {
            None => RunState::Idle,
            Some(clock) if clock.is_ticking() => RunState::Running,
            Some(_) => RunState::Paused,
        }
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn durations(&self) -> &Durations {
        &self.durations
    }

    pub fn durations_mut(&mut self) -> &mut Durations {
        &mut self.durations
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.clock.as_ref().map(SessionClock::phase)
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.clock.as_ref().map(SessionClock::remaining_secs)
    }

    pub fn handle(&mut self, command: Command) -> Vec<Effect> {
        match command {
            Command::Start => self.start(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop(),
            Command::Reset => self.reset(),
        }
    }

    /// Advance the live countdown by one second. A tick arriving while
    /// idle or paused is dropped; commands may have changed the state since
    /// the tick was scheduled.
    pub fn on_tick(&mut self) -> Vec<Effect> {
        let Some(clock) = self.clock.as_mut() else {
            return Vec::new();
        };
        if !clock.is_ticking() {
            return Vec::new();
        }

        let phase = clock.phase();
        let nominal = clock.nominal_secs();
        match clock.tick() {
            ClockTick::Counting { remaining } => vec![Effect::Countdown { phase, remaining }],
            ClockTick::Finished { remaining } => {
                self.clock = None;
                let mut effects = vec![
                    Effect::Countdown { phase, remaining },
                    Effect::SessionEnded { phase },
                ];
                let next = self.bank_completion(phase, nominal);
                effects.extend(self.launch(next));
                effects
            }
        }
    }

    fn start(&mut self) -> Vec<Effect> {
        if self.clock.is_some() {
            return vec![Effect::Rejected { reason: "A timer is already running or paused." }];
        }
        self.launch(Phase::Work)
    }

    fn launch(&mut self, phase: Phase) -> Vec<Effect> {
        let duration = self.durations.for_phase(phase);
        self.clock = Some(SessionClock::begin(phase, duration));
        vec![Effect::SessionStarted { phase, duration }]
    }

    fn pause(&mut self) -> Vec<Effect> {
        match self.clock.as_mut() {
            Some(clock) if clock.is_ticking() => {
                clock.halt();
                vec![Effect::SessionPaused { phase: clock.phase() }]
            }
            _ => vec![Effect::Rejected { reason: "No timer to pause." }],
        }
    }

    fn resume(&mut self) -> Vec<Effect> {
        match self.clock.as_mut() {
            Some(clock) if !clock.is_ticking() => {
                clock.resume();
                vec![Effect::SessionResumed { phase: clock.phase() }]
            }
            _ => vec![Effect::Rejected { reason: "No timer to resume." }],
        }
    }

    fn stop(&mut self) -> Vec<Effect> {
        match self.clock.take() {
            Some(clock) => {
                let phase = clock.phase();
                if phase.is_work() {
                    self.totals.work_secs += clock.elapsed_secs();
                } else {
                    self.totals.break_secs += clock.elapsed_secs();
                }
                vec![Effect::SessionStopped { phase }]
            }
            None => vec![Effect::Rejected { reason: "No timer to stop." }],
        }
    }

    fn reset(&mut self) -> Vec<Effect> {
        self.clock = None;
        self.totals = Totals::default();
        vec![Effect::CycleReset]
    }

    /// Credit a naturally finished session and pick what comes next.
    /// Break time accrues here, at completion, the same as work time.
    fn bank_completion(&mut self, finished: Phase, nominal: u64) -> Phase {
        match finished {
            Phase::Work => {
                self.totals.completed_work_sessions += 1;
                self.totals.work_secs += nominal;
            }
            Phase::ShortBreak | Phase::LongBreak => {
                self.totals.break_secs += nominal;
            }
        }
        next_phase(
            finished,
            self.totals.completed_work_sessions,
            self.durations.sessions_before_long_break.max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn durations(work: u64, short: u64, long: u64, cycle: u32) -> Durations {
        Durations {
            work_secs: work,
            short_break_secs: short,
            long_break_secs: long,
            sessions_before_long_break: cycle,
        }
    }

    fn started_phase(effects: &[Effect]) -> Option<Phase> {
        effects.iter().find_map(|e| match e {
            Effect::SessionStarted { phase, .. } => Some(*phase),
            _ => None,
        })
    }

    fn ended(effects: &[Effect]) -> bool {
        effects.iter().any(|e| matches!(e, Effect::SessionEnded { .. }))
    }

    /// Tick until the live session finishes, returning the phase that starts
    /// automatically in its place.
    fn run_to_completion(c: &mut CycleController) -> Phase {
        for _ in 0..10_000 {
            let effects = c.on_tick();
            if ended(&effects) {
                return started_phase(&effects).expect("the next session starts automatically");
            }
        }
        panic!("session never completed");
    }

    #[test]
    fn clock_counts_down_and_shows_zero_on_the_final_tick() {
        let mut clock = SessionClock::begin(Phase::Work, 2);
        assert_eq!(clock.tick(), ClockTick::Counting { remaining: 2 });
        assert_eq!(clock.tick(), ClockTick::Counting { remaining: 1 });
        assert_eq!(clock.tick(), ClockTick::Finished { remaining: 0 });
        assert!(!clock.is_ticking());
    }

    #[test]
    fn countdown_ticks_duration_plus_one_times() {
        let mut c = CycleController::new(durations(3, 10, 20, 4));
        c.handle(Command::Start);
        let mut ticks = 0;
        loop {
            ticks += 1;
            if ended(&c.on_tick()) {
                break;
            }
            assert!(ticks < 100, "never finished");
        }
        assert_eq!(ticks, 4);
    }

    #[test]
    fn zero_duration_finishes_on_the_first_tick() {
        let mut c = CycleController::new(durations(0, 10, 20, 4));
        c.handle(Command::Start);
        let effects = c.on_tick();
        assert!(ended(&effects));
        assert!(effects.contains(&Effect::Countdown { phase: Phase::Work, remaining: 0 }));
    }

    #[test]
    fn pause_blocks_ticks_and_completion() {
        let mut c = CycleController::new(durations(5, 5, 5, 4));
        c.handle(Command::Start);
        c.on_tick();
        c.handle(Command::Pause);
        assert_eq!(c.state(), RunState::Paused);
        for _ in 0..20 {
            assert!(c.on_tick().is_empty());
        }
        assert_eq!(c.totals().completed_work_sessions, 0);

        let effects = c.handle(Command::Pause);
        assert!(matches!(effects[0], Effect::Rejected { .. }));
        assert_eq!(c.state(), RunState::Paused);
    }

    #[test]
    fn resume_continues_from_the_retained_remaining() {
        let mut c = CycleController::new(durations(10, 5, 5, 4));
        c.handle(Command::Start);
        for _ in 0..4 {
            c.on_tick();
        }
        c.handle(Command::Pause);
        assert_eq!(c.remaining_secs(), Some(6));

        let effects = c.handle(Command::Resume);
        assert!(matches!(effects[0], Effect::SessionResumed { phase: Phase::Work }));
        assert!(started_phase(&effects).is_none(), "resume is not a fresh start");
        assert_eq!(
            c.on_tick(),
            vec![Effect::Countdown { phase: Phase::Work, remaining: 6 }]
        );
    }

    #[test]
    fn completion_after_resume_still_credits_the_work() {
        let mut c = CycleController::new(durations(3, 5, 5, 4));
        c.handle(Command::Start);
        c.on_tick();
        c.handle(Command::Pause);
        c.handle(Command::Resume);
        let mut finished = false;
        for _ in 0..3 {
            finished = finished || ended(&c.on_tick());
        }
        assert!(finished);
        assert_eq!(c.totals().completed_work_sessions, 1);
        assert_eq!(c.totals().work_secs, 3);
    }

    #[test]
    fn stop_banks_elapsed_work_time() {
        let mut c = CycleController::new(durations(100, 5, 5, 4));
        c.handle(Command::Start);
        for _ in 0..30 {
            c.on_tick();
        }
        let effects = c.handle(Command::Stop);
        assert!(matches!(effects[0], Effect::SessionStopped { phase: Phase::Work }));
        assert_eq!(c.state(), RunState::Idle);
        assert_eq!(c.totals().work_secs, 30);
        assert_eq!(c.totals().completed_work_sessions, 0);
    }

    #[test]
    fn stop_banks_elapsed_break_time() {
        let mut c = CycleController::new(durations(2, 50, 60, 4));
        c.handle(Command::Start);
        assert_eq!(run_to_completion(&mut c), Phase::ShortBreak);
        for _ in 0..10 {
            c.on_tick();
        }
        c.handle(Command::Stop);
        assert_eq!(c.totals().break_secs, 10);
        assert_eq!(c.totals().work_secs, 2);
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut c = CycleController::new(durations(10, 5, 5, 4));
        let effects = c.handle(Command::Stop);
        assert_eq!(effects, vec![Effect::Rejected { reason: "No timer to stop." }]);
        assert_eq!(c.totals(), &Totals::default());
    }

    #[test]
    fn reset_zeroes_totals_and_the_session_from_any_state() {
        let mut c = CycleController::new(durations(2, 2, 2, 4));
        c.handle(Command::Start);
        run_to_completion(&mut c);
        c.handle(Command::Pause);
        let effects = c.handle(Command::Reset);
        assert_eq!(effects, vec![Effect::CycleReset]);
        assert_eq!(c.state(), RunState::Idle);
        assert_eq!(c.totals(), &Totals::default());
        assert_eq!(c.remaining_secs(), None);

        // reset is also permitted while idle
        assert_eq!(c.handle(Command::Reset), vec![Effect::CycleReset]);
    }

    #[test]
    fn every_nth_work_session_earns_a_long_break() {
        let mut c = CycleController::new(durations(1, 1, 1, 2));
        c.handle(Command::Start);
        assert_eq!(run_to_completion(&mut c), Phase::ShortBreak);
        assert_eq!(run_to_completion(&mut c), Phase::Work);
        assert_eq!(run_to_completion(&mut c), Phase::LongBreak);
        assert_eq!(run_to_completion(&mut c), Phase::Work);
        assert_eq!(c.totals().completed_work_sessions, 2);
    }

    #[test]
    fn break_time_accrues_at_break_completion() {
        let mut c = CycleController::new(durations(1, 30, 30, 4));
        c.handle(Command::Start);
        run_to_completion(&mut c);
        assert_eq!(c.totals().break_secs, 0, "nothing banked when the break starts");
        run_to_completion(&mut c);
        assert_eq!(c.totals().break_secs, 30);
    }

    #[test]
    fn default_work_session_rolls_into_a_short_break() {
        let mut c = CycleController::new(Durations::default());
        c.handle(Command::Start);
        let mut last = Vec::new();
        for _ in 0..1501 {
            last = c.on_tick();
        }
        assert!(ended(&last));
        assert_eq!(started_phase(&last), Some(Phase::ShortBreak));
        assert_eq!(c.totals().work_secs, 1500);
        assert_eq!(c.totals().completed_work_sessions, 1);
    }

    #[test]
    fn settings_change_spares_the_running_session() {
        let mut c = CycleController::new(durations(10, 5, 5, 4));
        c.handle(Command::Start);
        for _ in 0..3 {
            c.on_tick();
        }
        c.durations_mut().work_secs = 1000;
        let mut finished = false;
        for _ in 0..8 {
            finished = finished || ended(&c.on_tick());
        }
        assert!(finished);
        assert_eq!(c.totals().work_secs, 10, "the in-flight nominal is untouched");

        // the next work session picks up the new duration
        let next_work = run_to_completion(&mut c);
        assert_eq!(next_work, Phase::Work);
        assert_eq!(c.remaining_secs(), Some(1000));
    }

    #[test]
    fn commands_in_the_wrong_state_are_rejected() {
        let mut c = CycleController::new(durations(10, 5, 5, 4));
        assert!(matches!(c.handle(Command::Pause)[0], Effect::Rejected { .. }));
        assert!(matches!(c.handle(Command::Resume)[0], Effect::Rejected { .. }));

        c.handle(Command::Start);
        assert!(matches!(c.handle(Command::Start)[0], Effect::Rejected { .. }));
        assert!(matches!(c.handle(Command::Resume)[0], Effect::Rejected { .. }));

        c.handle(Command::Pause);
        assert!(matches!(c.handle(Command::Start)[0], Effect::Rejected { .. }));
    }

    #[test]
    fn sequencing_table() {
        assert_eq!(next_phase(Phase::Work, 4, 4), Phase::LongBreak);
        assert_eq!(next_phase(Phase::Work, 8, 4), Phase::LongBreak);
        assert_eq!(next_phase(Phase::Work, 3, 4), Phase::ShortBreak);
        assert_eq!(next_phase(Phase::ShortBreak, 1, 4), Phase::Work);
        assert_eq!(next_phase(Phase::LongBreak, 4, 4), Phase::Work);
    }
}
