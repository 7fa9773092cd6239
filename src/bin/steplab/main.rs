//! steplab - terminal step sequencer
//!
//! Run with: cargo run [sequence.json]

mod app;
mod ui;

use app::App;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    // silent unless RUST_LOG is set; diagnostics go to stderr, not the TUI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let load_path = std::env::args().nth(1);
    let mut app = App::new(load_path.as_deref())?;

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();
    result
}
