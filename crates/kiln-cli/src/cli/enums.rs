use clap::ValueEnum;
use kiln_config::{Mode, Target};

/// Runtime environment the output is built for
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum TargetArg {
    #[value(name = "browser")]
    Browser,

    #[value(name = "node")]
    Node,

    /// Edge runtimes (workers)
    #[value(name = "edge")]
    Edge,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Browser => Target::Browser,
            TargetArg::Node => Target::Node,
            TargetArg::Edge => Target::Edge,
        }
    }
}

/// Build mode; part of every cache key
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum ModeArg {
    #[value(name = "development", alias = "dev")]
    Development,

    #[value(name = "production", alias = "prod")]
    Production,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Development => Mode::Development,
            ModeArg::Production => Mode::Production,
        }
    }
}
