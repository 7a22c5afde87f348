#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command, ModeArg, TargetArg};
    use clap::Parser;
    use kiln_config::{Mode, Target};
    use std::path::PathBuf;

    #[test]
    fn test_build_with_overrides() {
        let cli = Cli::try_parse_from([
            "kiln",
            "build",
            "src/main.ts",
            "src/worker.ts",
            "--root",
            "/project",
            "--target",
            "node",
            "--mode",
            "prod",
            "-d",
            "out",
            "--no-cache",
        ])
        .unwrap();

        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.project.entries, vec!["src/main.ts", "src/worker.ts"]);
        assert_eq!(args.project.root, Some(PathBuf::from("/project")));
        assert_eq!(args.project.target, Some(TargetArg::Node));
        assert_eq!(args.project.mode, Some(ModeArg::Production));
        assert_eq!(args.out_dir, Some(PathBuf::from("out")));
        assert!(args.no_cache);
        assert!(!args.verify);
    }

    #[test]
    fn test_build_without_entries_defers_to_config() {
        let cli = Cli::try_parse_from(["kiln", "build"]).unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert!(args.project.entries.is_empty());
        assert!(args.out_dir.is_none());
    }

    #[test]
    fn test_force_conflicts_with_no_cache() {
        assert!(Cli::try_parse_from(["kiln", "build", "--force", "--no-cache"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["kiln", "-v", "-q", "build"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "dev", "src/main.ts", "--verbose", "--no-color"])
            .unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
        assert!(matches!(cli.command, Command::Dev(_)));
    }

    #[test]
    fn test_dev_debounce() {
        let cli = Cli::try_parse_from(["kiln", "dev", "--debounce", "250"]).unwrap();
        let Command::Dev(args) = cli.command else {
            panic!("expected dev");
        };
        assert_eq!(args.debounce, Some(250));
    }

    #[test]
    fn test_invalid_target_rejected() {
        assert!(Cli::try_parse_from(["kiln", "build", "--target", "deno"]).is_err());
    }

    #[test]
    fn test_enum_conversions() {
        assert_eq!(Target::from(TargetArg::Edge), Target::Edge);
        assert_eq!(Mode::from(ModeArg::Development), Mode::Development);
    }
}
