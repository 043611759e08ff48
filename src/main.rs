use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::{Key, Term};
use indicatif::{ProgressBar, ProgressStyle};
use sokoban_bfs::solve::{path_directions, Notification, Sink, Solver, SolverConfig};
use sokoban_bfs::tape::Tape;
use sokoban_bfs::{BoardState, Direction};

const FRAME: Duration = Duration::from_millis(16);
const PROGRESS_CHUNK: usize = 4096;

#[derive(Debug, Parser)]
#[command(about = "Play a Sokoban level or watch breadth-first search solve it")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play the level with the arrow keys or WASD.
    Play { map: PathBuf },
    /// Search for a solution.
    Solve {
        map: PathBuf,
        /// Milliseconds between animated search steps.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        /// Number of states shown per tape.
        #[arg(long, default_value_t = 5)]
        window: usize,
        /// Give up after this many steps.
        #[arg(long)]
        max_steps: Option<usize>,
        /// Print only the result.
        #[arg(long)]
        no_animate: bool,
    },
}

enum Action {
    Exit,
    Go(Direction),
    Reset,
}

impl TryFrom<Key> for Action {
    type Error = ();

    fn try_from(key: Key) -> Result<Self, Self::Error> {
        Ok(match key {
            Key::ArrowLeft | Key::Char('a') => Self::Go(Direction::Left),
            Key::ArrowRight | Key::Char('d') => Self::Go(Direction::Right),
            Key::ArrowUp | Key::Char('w') => Self::Go(Direction::Up),
            Key::ArrowDown | Key::Char('s') => Self::Go(Direction::Down),
            Key::Escape | Key::Char('q') => Self::Exit,
            Key::Char('r') => Self::Reset,
            _ => return Err(()),
        })
    }
}

fn load(path: &Path) -> Result<BoardState> {
    let map_data = std::fs::read_to_string(path).context("Failed to read the map")?;
    map_data
        .parse::<BoardState>()
        .context("Failed to parse the map")
}

fn play(init_state: BoardState) -> Result<()> {
    let mut state = init_state.clone();
    let term = Term::stderr();
    loop {
        eprintln!("{state}");
        if state.is_victory() {
            eprintln!("Solved!");
        }

        let action = loop {
            if let Ok(action) = Action::try_from(term.read_key()?) {
                break action;
            }
        };

        match action {
            Action::Exit => break,
            Action::Go(dir) => {
                if let Err(err) = state.go(dir) {
                    log::debug!("{dir}: {err}");
                }
            }
            Action::Reset => state = init_state.clone(),
        }
    }
    Ok(())
}

/// Lays out the visible window of a tape side by side, marking the head.
fn render_tape(title: &str, tape: &Tape<BoardState>) -> String {
    let mut out = format!("{title} ({})\n", tape.len());
    let boards = tape
        .window()
        .map(|(i, state)| {
            let mark = if tape.head_index() == Some(i) { '>' } else { ' ' };
            let lines = state.to_string().lines().map(str::to_owned).collect::<Vec<_>>();
            (format!("{mark}{i}"), lines)
        })
        .collect::<Vec<_>>();
    let height = boards.iter().map(|(_, lines)| lines.len()).max().unwrap_or(0);
    let widths = boards
        .iter()
        .map(|(label, lines)| {
            let grid_width = lines.first().map_or(0, |line| line.len());
            label.len().max(grid_width)
        })
        .collect::<Vec<_>>();

    let labels = boards.iter().map(|(label, _)| label.as_str()).collect::<Vec<_>>();
    let rows = std::iter::once(labels).chain((0..height).map(|row| {
        boards
            .iter()
            .map(|(_, lines)| lines.get(row).map_or("", String::as_str))
            .collect::<Vec<_>>()
    }));
    for cells in rows {
        for (cell, width) in cells.iter().zip(widths.iter().copied()) {
            out.push_str(&format!("{cell:<width$}  "));
        }
        out.push('\n');
    }
    out
}

fn animate<S: Sink>(solver: &mut Solver<S>, max_steps: Option<usize>) -> Result<()> {
    let term = Term::stderr();
    let mut last = Instant::now();
    while solver.mode().is_solving() && max_steps.map_or(true, |max| solver.steps() < max) {
        let now = Instant::now();
        solver.update(now - last);
        last = now;

        term.clear_screen()?;
        let mut frame = format!(
            "step {} {:?}, {} visited\n\n",
            solver.steps(),
            solver.phase(),
            solver.visited_len()
        );
        if let Some(current) = solver.current() {
            frame.push_str("current\n");
            frame.push_str(&current.to_string());
            frame.push('\n');
        }
        frame.push_str(&render_tape("frontier", solver.frontier()));
        frame.push('\n');
        frame.push_str(&render_tape("neighbors", solver.neighbors()));
        frame.push('\n');
        frame.push_str(&render_tape("visited", solver.history()));
        term.write_str(&frame)?;

        std::thread::sleep(FRAME);
    }
    Ok(())
}

fn run_quiet<S: Sink>(solver: &mut Solver<S>, max_steps: Option<usize>) -> Result<()> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} [{elapsed}] {msg}")?);
    loop {
        let chunk = max_steps.map_or(PROGRESS_CHUNK, |max| {
            max.saturating_sub(solver.steps()).min(PROGRESS_CHUNK)
        });
        if chunk == 0 || !solver.run(Some(chunk)).is_solving() {
            break;
        }
        bar.set_message(format!(
            "{} visited, {} queued",
            solver.visited_len(),
            solver.frontier().len()
        ));
        bar.tick();
    }
    bar.finish_and_clear();
    Ok(())
}

fn solve(
    root: BoardState,
    config: SolverConfig,
    max_steps: Option<usize>,
    animated: bool,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut solver = Solver::with_config(root, config, tx).context("Invalid solver config")?;
    if animated {
        animate(&mut solver, max_steps)?;
    } else {
        run_quiet(&mut solver, max_steps)?;
    }

    match rx.try_recv() {
        Ok(Notification::Victory { path, .. }) => {
            let steps = path_directions(&path).context("Broken solution path")?;
            eprintln!(
                "Solved in {} moves, {} states visited",
                steps.len(),
                solver.visited_len()
            );
            println!("{}", steps.iter().map(ToString::to_string).collect::<String>());
        }
        Ok(Notification::Defeat { .. }) => {
            eprintln!("No solution, {} states visited", solver.visited_len());
        }
        Err(_) => {
            eprintln!(
                "Gave up after {} steps, {} states visited",
                solver.steps(),
                solver.visited_len()
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Play { map } => play(load(&map)?),
        Command::Solve {
            map,
            interval_ms,
            window,
            max_steps,
            no_animate,
        } => {
            let config = SolverConfig {
                window_size: window,
                step_interval: Duration::from_millis(interval_ms),
            };
            log::info!("Solving {} with {config:?}", map.display());
            solve(load(&map)?, config, max_steps, !no_animate)
        }
    }
}
