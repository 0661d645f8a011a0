//! Startup banner and URL display

use super::constants::APP_NAME;

/// Check if host binds to all network interfaces
fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

/// Print the startup banner with URLs
pub fn print_banner(host: &str, port: u16, facebook_configured: bool, data_dir: &str) {
    // Use localhost for display when binding to all interfaces
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    // Label width: "Facebook webhook:" is 17 chars, pad to 19 for alignment
    const W: usize = 19;

    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}:{}/api/v1",
        "API:", display_host, port
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}:{}/api/docs",
        "API docs:", display_host, port
    );

    if facebook_configured {
        println!(
            "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}:{}/webhooks/facebook",
            "Facebook webhook:", display_host, port
        );
    } else {
        println!(
            "  \x1b[90m➜  {:<W$} not configured (set LEADFLOW_FB_* env vars)\x1b[0m",
            "Facebook webhook:"
        );
    }
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}:{}/webhooks/website",
        "Website webhook:", display_host, port
    );

    if host == "127.0.0.1" || host == "localhost" {
        println!(
            "  \x1b[90m➜  {:<W$} use --host 0.0.0.0 to expose\x1b[0m",
            "Network:"
        );
    }
    println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Data:", data_dir);

    println!();
}
