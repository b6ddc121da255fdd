// FILE: src/cli/mod.rs

mod config;
mod handlers;

pub use config::ConfigFile;

use crate::error::{CompilerError, Result};
use crate::{CompilerOptions, ShadowPolicy};
use clap::{Arg, ArgAction, Command, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Debug,
    Text,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShadowLevel {
    Ignore,
    Warn,
    Error,
}

impl From<ShadowLevel> for ShadowPolicy {
    fn from(level: ShadowLevel) -> Self {
        match level {
            ShadowLevel::Ignore => ShadowPolicy::Ignore,
            ShadowLevel::Warn => ShadowPolicy::Warn,
            ShadowLevel::Error => ShadowPolicy::Error,
        }
    }
}

pub struct SlyCli {
    config: ConfigFile,
}

impl Default for SlyCli {
    fn default() -> Self {
        Self::new()
    }
}

impl SlyCli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
        }
    }

    /// Returns whether every input compiled without Error diagnostics.
    pub fn run(&mut self) -> Result<bool> {
        let matches = self.build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"))?;

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("parse", sub_matches)) => handlers::handle_parse_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(true)
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Sly Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.json or .toml)")
                    .global(true)
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .global(true)
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile a template into its command stream")
                    .arg(Arg::new("input").help("Input template file").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write the command stream to FILE instead of stdout"))
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(OutputFormat)).default_value("text").help("Output format"))
                    .arg(Arg::new("buffer-size").long("buffer-size").value_name("N").value_parser(clap::value_parser!(u64).range(1..)).help("Parser chunk size in bytes"))
                    .arg(Arg::new("global").short('g').long("global").value_name("NAME").help("Add a global binding name").action(ArgAction::Append))
                    .arg(Arg::new("shadow").long("shadow").value_parser(clap::value_parser!(ShadowLevel)).help("Reaction to locals hiding a global binding"))
                    .arg(Arg::new("strict").long("strict").help("Warn about undeclared identifiers").action(ArgAction::SetTrue))
                    .arg(Arg::new("disable-filter").long("disable-filter").value_name("OPTION").help("Leave a built-in filter out of the pipeline").action(ArgAction::Append))
                    .arg(Arg::new("stats").long("stats").help("Show compilation statistics").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Check templates for errors without writing output")
                    .arg(Arg::new("input").help("Input template file or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all .html files in directory recursively").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("parse")
                    .about("Print the node tree of a template")
                    .arg(Arg::new("input").help("Input template file").required(true).index(1))
                    .arg(Arg::new("format").short('f').long("format").value_parser(["json", "debug"]).default_value("json").help("Tree output format")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .try_init()
            .map_err(|e| CompilerError::configuration(format!("Logger setup failed: {}", e)))
    }

    /// Defaults overlaid with the config file.
    pub fn base_options(&self) -> CompilerOptions {
        let mut options = CompilerOptions::default();
        self.config.apply(&mut options);
        options
    }

    /// Config file values overridden by `compile` flags.
    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> Result<CompilerOptions> {
        let mut options = self.base_options();
        if let Some(buffer_size) = matches.get_one::<u64>("buffer-size") {
            options.buffer_size = usize::try_from(*buffer_size).map_err(|_| CompilerError::InvalidFormat {
                message: format!("Buffer size {} is too large", buffer_size),
            })?;
        }
        if let Some(globals) = matches.get_many::<String>("global") {
            for global in globals {
                if !options.globals.iter().any(|g| g.eq_ignore_ascii_case(global)) {
                    options.globals.push(global.clone());
                }
            }
        }
        if let Some(level) = matches.get_one::<ShadowLevel>("shadow") {
            options.shadow_policy = (*level).into();
        }
        if matches.get_flag("strict") {
            options.strict_identifiers = true;
        }
        if let Some(disabled) = matches.get_many::<String>("disable-filter") {
            options.disabled_filters.extend(disabled.cloned());
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_matches(args: &[&str]) -> clap::ArgMatches {
        let cli = SlyCli::new();
        let matches = cli
            .build_cli()
            .try_get_matches_from(args.iter().copied())
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "compile");
        sub.clone()
    }

    #[test]
    fn test_flags_override_defaults() {
        let matches = compile_matches(&[
            "slyc", "compile", "page.html", "--buffer-size", "3", "-g", "site", "-g", "Request",
            "--shadow", "error", "--strict", "--disable-filter", "i18n",
        ]);
        let options = SlyCli::new().build_compiler_options(&matches).unwrap();
        assert_eq!(options.buffer_size, 3);
        assert_eq!(options.shadow_policy, ShadowPolicy::Error);
        assert!(options.strict_identifiers);
        assert_eq!(options.disabled_filters, vec!["i18n".to_string()]);
        assert_eq!(options.globals.iter().filter(|g| g.as_str() == "site").count(), 1);
        assert_eq!(options.globals.len(), crate::core::DEFAULT_GLOBALS.len() + 1);
    }

    #[test]
    fn test_config_then_flags() {
        let mut cli = SlyCli::new();
        cli.config = ConfigFile {
            buffer_size: Some(64),
            shadow_policy: Some(ShadowPolicy::Ignore),
            ..Default::default()
        };
        let matches = compile_matches(&["slyc", "compile", "page.html", "--shadow", "warn"]);
        let options = cli.build_compiler_options(&matches).unwrap();
        assert_eq!(options.buffer_size, 64);
        assert_eq!(options.shadow_policy, ShadowPolicy::Warn);
    }

    #[test]
    fn test_invalid_arguments() {
        let cli = SlyCli::new();
        assert!(cli
            .build_cli()
            .try_get_matches_from(["slyc", "compile", "a.html", "--buffer-size", "0"])
            .is_err());
        assert!(cli
            .build_cli()
            .try_get_matches_from(["slyc", "parse", "a.html", "-f", "text"])
            .is_err());
    }
}
