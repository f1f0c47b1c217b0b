use std::path::PathBuf;

const USAGE: &str = "usage: roost-cli [--config roost.yaml] [--server host:port] \
<get|set|create|delete|delete-all|ls|ls2|watch|watch-children|ensure> <path> [data] \
[--ephemeral] [--sequential]";

#[derive(Debug)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub server: Option<String>,
    pub command: CliCommand,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand {
    Get { path: String },
    Set { path: String, data: String },
    Create { path: String, data: String, ephemeral: bool, sequential: bool },
    Delete { path: String },
    DeleteAll { path: String },
    Ls { path: String },
    Ls2 { path: String },
    Watch { path: String },
    WatchChildren { path: String },
    EnsurePath { path: String },
}

impl CliArgs {
    pub fn parse<I>(mut args: I) -> Result<Self, String>
    where
        I: Iterator<Item = String>,
    {
        let mut config_path = None;
        let mut server = None;
        let mut ephemeral = false;
        let mut sequential = false;
        let mut positional: Vec<String> = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let value = args
                        .next()
                        .ok_or_else(|| "missing value for --config".to_string())?;
                    config_path = Some(PathBuf::from(value));
                }
                "--server" => {
                    server = Some(args.next().ok_or_else(|| {
                        "missing value for --server".to_string()
                    })?);
                }
                "--ephemeral" => ephemeral = true,
                "--sequential" => sequential = true,
                "-h" | "--help" => return Err(USAGE.to_string()),
                other if other.starts_with('-') => {
                    return Err(format!("unknown argument: {other}"));
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let name = positional.next().ok_or_else(|| USAGE.to_string())?;
        let path = positional
            .next()
            .ok_or_else(|| format!("missing <path> for {name}"))?;

        let command = match name.as_str() {
            "get" => CliCommand::Get { path },
            "set" => CliCommand::Set {
                path,
                data: positional
                    .next()
                    .ok_or_else(|| "missing <data> for set".to_string())?,
            },
            "create" => CliCommand::Create {
                path,
                data: positional.next().unwrap_or_default(),
                ephemeral,
                sequential,
            },
            "delete" => CliCommand::Delete { path },
            "delete-all" => CliCommand::DeleteAll { path },
            "ls" => CliCommand::Ls { path },
            "ls2" => CliCommand::Ls2 { path },
            "watch" => CliCommand::Watch { path },
            "watch-children" => CliCommand::WatchChildren { path },
            "ensure" => CliCommand::EnsurePath { path },
            other => return Err(format!("unknown command: {other}")),
        };

        if (ephemeral || sequential)
            && !matches!(command, CliCommand::Create { .. })
        {
            return Err(
                "--ephemeral and --sequential only apply to create".to_string()
            );
        }

        Ok(Self { config_path, server, command })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{CliArgs, CliCommand};

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        CliArgs::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parses_get_with_options() {
        let args = parse(&[
            "--config",
            "/etc/roost.yaml",
            "--server",
            "127.0.0.1:2181",
            "get",
            "/a",
        ])
        .expect("parse should succeed");
        assert_eq!(args.config_path, Some(PathBuf::from("/etc/roost.yaml")));
        assert_eq!(args.server.as_deref(), Some("127.0.0.1:2181"));
        assert_eq!(args.command, CliCommand::Get { path: "/a".to_string() });
    }

    #[test]
    fn parses_create_flags() {
        let args = parse(&["create", "/a", "payload", "--ephemeral"])
            .expect("parse should succeed");
        assert_eq!(
            args.command,
            CliCommand::Create {
                path: "/a".to_string(),
                data: "payload".to_string(),
                ephemeral: true,
                sequential: false,
            }
        );
    }

    #[test]
    fn create_data_defaults_to_empty() {
        let args = parse(&["create", "/a"]).expect("parse should succeed");
        assert!(matches!(
            args.command,
            CliCommand::Create { ref data, .. } if data.is_empty()
        ));
    }

    #[test]
    fn rejects_missing_path() {
        let err = parse(&["get"]).expect_err("parse should fail");
        assert!(err.contains("missing <path>"));
    }

    #[test]
    fn rejects_unknown_command() {
        let err = parse(&["frobnicate", "/a"]).expect_err("parse should fail");
        assert!(err.contains("unknown command"));
    }

    #[test]
    fn rejects_create_flags_on_other_commands() {
        let err =
            parse(&["get", "/a", "--ephemeral"]).expect_err("parse should fail");
        assert!(err.contains("only apply to create"));
    }
}
