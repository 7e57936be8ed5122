use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};

use crate::config::Durations;
use crate::engine::{Command as CycleCommand, CycleController, Effect, Phase, RunState};
use crate::notify::Notifier;
use crate::stats::StatsStore;

mod config;
mod engine;
mod notify;
mod stats;

// ============================================================================
// Constants & CLI Arguments
// ============================================================================

const TICK_RATE: Duration = Duration::from_secs(1);
const STATS_FILE: &str = "savedState.json";

#[derive(Parser)]
#[command(version, about = "🍅 pomo - An Interactive Command-Line Pomodoro Timer")]
struct Args {
    #[arg(short, long, value_parser = config::parse_duration)]
    work: Option<u64>,
    #[arg(short, long, value_parser = config::parse_duration)]
    rest: Option<u64>,
    #[arg(short, long, value_parser = config::parse_duration)]
    long_break: Option<u64>,
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    sessions: Option<u32>,
    #[arg(long)]
    no_sound: bool,
    #[arg(long)]
    stats_file: Option<PathBuf>,
}

// ============================================================================
// Command Parsing & Input Modes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Settings,
    Stat,
    Help,
    Exit,
}

fn parse_command(line: &str) -> Option<UserCommand> {
    match line.trim().to_lowercase().as_str() {
        "start" | "w" => Some(UserCommand::Start),
        "pause" | "p" => Some(UserCommand::Pause),
        "resume" | "r" => Some(UserCommand::Resume),
        "stop" | "a" => Some(UserCommand::Stop),
        "reset" => Some(UserCommand::Reset),
        "settings" => Some(UserCommand::Settings),
        "stat" => Some(UserCommand::Stat),
        "help" | "h" => Some(UserCommand::Help),
        "exit" => Some(UserCommand::Exit),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Command,
    Menu,
    EditMinutes(MenuField),
    EditCycle,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MenuField {
    Work,
    ShortBreak,
    LongBreak,
}

// ============================================================================
// Application
// ============================================================================

struct App {
    controller: CycleController,
    notifier: Notifier,
    store: StatsStore,
    mode: InputMode,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut durations = Durations::default();
    if let Some(work) = args.work {
        durations.work_secs = work;
    }
    if let Some(rest) = args.rest {
        durations.short_break_secs = rest;
    }
    if let Some(long) = args.long_break {
        durations.long_break_secs = long;
    }
    if let Some(sessions) = args.sessions {
        durations.sessions_before_long_break = sessions;
    }

    let mut app = App {
        controller: CycleController::new(durations),
        notifier: Notifier::new(!args.no_sound),
        store: StatsStore::new(args.stats_file.unwrap_or_else(|| PathBuf::from(STATS_FILE))),
        mode: InputMode::Command,
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    clear_screen();
    print_welcome();
    prompt(&app);

    run(&mut app, &rx);

    println!("\nExiting Pomodoro Timer. Goodbye!");
    if let (Some(phase), Some(remaining)) =
        (app.controller.current_phase(), app.controller.remaining_secs())
    {
        // elapsed time of an unfinished session is only banked by `stop`
        println!(
            "Unfinished {} session ({} remaining) was not added to the statistics.",
            phase.label(),
            format_clock(remaining)
        );
    }
    app.store
        .record(app.controller.totals())
        .context("saving statistics")?;
    Ok(())
}

// Single sequential handler: stdin lines and the 1-second tick are both
// drained here, so command handling always sees the state the last tick
// left behind.
fn run(app: &mut App, rx: &Receiver<String>) {
    let mut last_tick = Instant::now();

    loop {
        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        match rx.recv_timeout(timeout) {
            Ok(line) => {
                if handle_line(app, &line) {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        if last_tick.elapsed() >= TICK_RATE {
            if app.controller.state() == RunState::Running {
                let effects = app.controller.on_tick();
                perform(app, &effects);
            }
            last_tick = Instant::now();
        }
    }
}

// ============================================================================
// Input Handling
// ============================================================================

fn handle_line(app: &mut App, line: &str) -> bool {
    match app.mode {
        InputMode::Command => handle_command(app, line),
        InputMode::Menu => {
            handle_menu_choice(app, line);
            false
        }
        InputMode::EditMinutes(field) => {
            handle_minutes_entry(app, field, line);
            false
        }
        InputMode::EditCycle => {
            handle_cycle_entry(app, line);
            false
        }
    }
}

fn handle_command(app: &mut App, line: &str) -> bool {
    match parse_command(line) {
        Some(UserCommand::Exit) => return true,
        Some(UserCommand::Start) => dispatch(app, CycleCommand::Start),
        Some(UserCommand::Pause) => dispatch(app, CycleCommand::Pause),
        Some(UserCommand::Resume) => dispatch(app, CycleCommand::Resume),
        Some(UserCommand::Stop) => dispatch(app, CycleCommand::Stop),
        Some(UserCommand::Reset) => dispatch(app, CycleCommand::Reset),
        Some(UserCommand::Settings) => {
            clear_screen();
            app.mode = InputMode::Menu;
            print_menu(&app.controller);
            prompt(app);
        }
        Some(UserCommand::Stat) => {
            clear_screen();
            print_stats(&app.store);
            prompt(app);
        }
        Some(UserCommand::Help) => {
            clear_screen();
            print_help();
            prompt(app);
        }
        None => {
            clear_screen();
            println!("{}", "Please enter a valid command!".red());
            prompt(app);
        }
    }
    false
}

fn dispatch(app: &mut App, command: CycleCommand) {
    let effects = app.controller.handle(command);
    perform(app, &effects);
    prompt(app);
}

fn handle_menu_choice(app: &mut App, line: &str) {
    match line.trim().parse::<u32>() {
        Ok(1) => app.mode = InputMode::EditMinutes(MenuField::Work),
        Ok(2) => app.mode = InputMode::EditMinutes(MenuField::ShortBreak),
        Ok(3) => app.mode = InputMode::EditMinutes(MenuField::LongBreak),
        Ok(4) => app.mode = InputMode::EditCycle,
        Ok(5) => {
            *app.controller.durations_mut() = Durations::default();
            clear_screen();
            println!("{}", "Settings restored to defaults.".green());
            print_menu(&app.controller);
        }
        Ok(6) => {
            clear_screen();
            app.mode = InputMode::Command;
            print_welcome();
        }
        _ => {
            clear_screen();
            println!("{}", "Please enter a number between 1 and 6.".red());
            print_menu(&app.controller);
        }
    }
    prompt(app);
}

fn handle_minutes_entry(app: &mut App, field: MenuField, line: &str) {
    match line.trim().parse::<u64>() {
        Ok(minutes) if minutes > 0 => {
            let secs = minutes * 60;
            let durations = app.controller.durations_mut();
            match field {
                MenuField::Work => durations.work_secs = secs,
                MenuField::ShortBreak => durations.short_break_secs = secs,
                MenuField::LongBreak => durations.long_break_secs = secs,
            }
            clear_screen();
            app.mode = InputMode::Menu;
            print_menu(&app.controller);
        }
        _ => {
            clear_screen();
            println!("{}", "Please enter a valid number of minutes.".red());
        }
    }
    prompt(app);
}

fn handle_cycle_entry(app: &mut App, line: &str) {
    match line.trim().parse::<u32>() {
        Ok(count) if count > 0 => {
            app.controller.durations_mut().sessions_before_long_break = count;
            clear_screen();
            app.mode = InputMode::Menu;
            print_menu(&app.controller);
        }
        _ => {
            clear_screen();
            println!("{}", "Please enter a valid number of sessions.".red());
        }
    }
    prompt(app);
}

// ============================================================================
// Effect Execution
// ============================================================================

fn perform(app: &App, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::Countdown { phase, remaining } => {
                print!(
                    "\r{} Session: {}   ",
                    styled_label(*phase),
                    format_clock(*remaining)
                );
                let _ = io::stdout().flush();
            }
            Effect::SessionStarted { phase, .. } => {
                match phase {
                    Phase::Work => {
                        clear_screen();
                        println!("\n{}", "Work Session Started".green().bold());
                    }
                    Phase::ShortBreak => println!("\n{}", "Take a short break!".cyan().bold()),
                    Phase::LongBreak => println!("\n{}", "Time for a long break!".blue().bold()),
                }
                app.notifier.session_started(phase.label());
            }
            Effect::SessionEnded { phase } => {
                println!("\n{} ended.", phase.label());
                app.notifier.session_ended(phase.label());
            }
            Effect::SessionPaused { phase } => {
                println!("\n{} has been paused.", phase.label());
            }
            Effect::SessionResumed { phase } => {
                println!("\n{} session resuming...", phase.label());
            }
            Effect::SessionStopped { phase } => {
                clear_screen();
                println!("\n{} session stopped.", phase.label());
            }
            Effect::CycleReset => {
                clear_screen();
                println!("\nTimer has been reset");
            }
            Effect::Rejected { reason } => println!("{reason}"),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn prompt(app: &App) {
    let text = match app.mode {
        InputMode::Command => "Insert a command: ",
        InputMode::Menu => "Insert a number (1-6): ",
        InputMode::EditMinutes(_) => "Enter the time in minutes: ",
        InputMode::EditCycle => "Enter the number of sessions: ",
    };
    print!("{text}");
    let _ = io::stdout().flush();
}

fn print_welcome() {
    println!("{}\n", "Welcome to the Pomodoro Timer!".bold());
    println!("start    - Start the Pomodoro");
    println!("settings - Change the time durations");
    println!("stat     - See the statistics");
    println!("help     - See all available commands");
    println!("exit     - Exit the program\n");
}

fn print_help() {
    println!(
        "
Available Commands:
start, w  - Start the Pomodoro timer
pause, p  - Pause the current timer
resume, r - Resume the paused timer
stop, a   - Stop the current timer and bank the elapsed time
reset     - Reset the timer and all statistics
settings  - Change timer settings (durations, cycle length)
stat      - Show the saved statistics
help, h   - Display this help message
exit      - Save statistics and exit
"
    );
}

fn print_menu(controller: &CycleController) {
    let durations = controller.durations();
    println!("{}\n", "Settings".bold());
    println!("1) Work duration                ({} min)", durations.work_secs / 60);
    println!("2) Short break duration         ({} min)", durations.short_break_secs / 60);
    println!("3) Long break duration          ({} min)", durations.long_break_secs / 60);
    println!("4) Sessions before a long break ({})", durations.sessions_before_long_break);
    println!("5) Restore default settings");
    println!("6) Back\n");
}

fn print_stats(store: &StatsStore) {
    match store.load() {
        Ok(records) if records.is_empty() => println!("No statistics recorded yet."),
        Ok(records) => {
            println!(
                "{}",
                format!("{:<12} {:>10} {:>10} {:>8}", "Date", "Work", "Break", "Cycles").bold()
            );
            for record in records {
                println!(
                    "{:<12} {:>10} {:>10} {:>8}",
                    record.id,
                    format_hms(record.total_work_time),
                    format_hms(record.total_break_time),
                    record.completed_work_sessions
                );
            }
        }
        Err(err) => println!("{}", format!("Could not read statistics: {err}").red()),
    }
}

fn styled_label(phase: Phase) -> ColoredString {
    match phase {
        Phase::Work => phase.label().green().bold(),
        Phase::ShortBreak => phase.label().cyan().bold(),
        Phase::LongBreak => phase.label().blue().bold(),
    }
}

fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn format_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn clear_screen() {
    let _ = execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_aliases_and_any_case() {
        assert_eq!(parse_command("start"), Some(UserCommand::Start));
        assert_eq!(parse_command("w"), Some(UserCommand::Start));
        assert_eq!(parse_command("  PAUSE "), Some(UserCommand::Pause));
        assert_eq!(parse_command("p"), Some(UserCommand::Pause));
        assert_eq!(parse_command("Resume"), Some(UserCommand::Resume));
        assert_eq!(parse_command("r"), Some(UserCommand::Resume));
        assert_eq!(parse_command("stop"), Some(UserCommand::Stop));
        assert_eq!(parse_command("a"), Some(UserCommand::Stop));
        assert_eq!(parse_command("reset"), Some(UserCommand::Reset));
        assert_eq!(parse_command("settings"), Some(UserCommand::Settings));
        assert_eq!(parse_command("stat"), Some(UserCommand::Stat));
        assert_eq!(parse_command("h"), Some(UserCommand::Help));
        assert_eq!(parse_command("EXIT"), Some(UserCommand::Exit));
    }

    #[test]
    fn unknown_input_parses_to_none() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("launch"), None);
        assert_eq!(parse_command("start now"), None);
    }

    #[test]
    fn clock_formats_zero_padded() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(1500), "25:00");
    }

    #[test]
    fn hms_formats_hours() {
        assert_eq!(format_hms(9000), "02:30:00");
        assert_eq!(format_hms(61), "00:01:01");
    }
}
