use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "infinidesk")]
#[command(version, about = "Infinite-canvas Wayland compositor")]
pub struct Cli {
    /// Shell command to run once after initialisation
    #[arg(long, short = 's', value_name = "CMD")]
    pub startup: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'd', action = ArgAction::SetTrue)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn parses_startup_command() {
        let cli = Cli::try_parse_from(["infinidesk", "--startup", "kitty"]).unwrap();
        assert_eq!(cli.startup.as_deref(), Some("kitty"));
        assert!(!cli.debug);
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from(["infinidesk", "-d", "-s", "waybar"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.startup.as_deref(), Some("waybar"));
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["infinidesk", "--frobnicate"]).is_err());
    }
}
