use console::style;

const TAGLINE: &str = "wordlist -> enumeration -> injection scan";

/// One-line startup banner on stderr.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("dev");
    let built = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");

    eprintln!(
        "\n  {} {}  {}",
        style("fuzzchain").color256(209).bold(),
        style(format!("v{} ({})", version, git_hash)).dim(),
        style(TAGLINE).color256(131)
    );
    eprintln!("  {}\n", style(format!("built {}", built)).color256(240));
}
