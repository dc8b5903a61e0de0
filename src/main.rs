fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = pollster::block_on(pbr_ibl::run()) {
        log::error!("Application error: {err:?}");
        std::process::exit(1);
    }
}
