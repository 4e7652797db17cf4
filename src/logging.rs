use tracing_subscriber::EnvFilter;

/// `RUST_LOG`가 없을 때 `-v` 개수에 따라 쓰는 필터.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "tunefetch=warn",
        1 => "tunefetch=info",
        _ => "tunefetch=debug",
    }
}

/// 전역 subscriber를 설치한다. 로그는 stderr로 나가며 stdout의 최종 리포트와 섞이지 않는다.
pub fn init_tracing(verbosity: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity).into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
