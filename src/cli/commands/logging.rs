use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Accepts either a repeat count (`-vv`), a bare number, or a level name
/// via `SESIO_LOG_LEVEL`.
#[must_use]
pub fn verbosity_parser() -> ValueParser {
    ValueParser::from(|value: &str| -> std::result::Result<u8, String> {
        match value.to_lowercase().as_str() {
            "error" => return Ok(0),
            "warn" => return Ok(1),
            "info" => return Ok(2),
            "debug" => return Ok(3),
            "trace" => return Ok(4),
            _ => {}
        }
        match value.parse::<u8>() {
            Ok(count) if count <= 5 => Ok(count),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("SESIO_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(verbosity_parser()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_parser_accepts_names_and_numbers() {
        let command = Command::new("test").arg(
            Arg::new("level")
                .long("level")
                .value_parser(verbosity_parser())
                .action(clap::ArgAction::Set),
        );
        let matches = command
            .clone()
            .try_get_matches_from(["test", "--level", "debug"])
            .expect("named level");
        assert_eq!(matches.get_one::<u8>("level"), Some(&3));

        let matches = command
            .try_get_matches_from(["test", "--level", "2"])
            .expect("numeric level");
        assert_eq!(matches.get_one::<u8>("level"), Some(&2));
    }

    #[test]
    fn verbosity_parser_rejects_unknown_names() {
        let command = Command::new("test").arg(
            Arg::new("level")
                .long("level")
                .value_parser(verbosity_parser())
                .action(clap::ArgAction::Set),
        );
        assert!(
            command
                .try_get_matches_from(["test", "--level", "loud"])
                .is_err()
        );
    }
}
