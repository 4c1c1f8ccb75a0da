mod config;
mod engine;
mod events;
mod media;
mod mpris;
mod playlist;
mod runtime;
mod store;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Events own stdout; logging stays on stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    runtime::run()
}
