use crate::error::CliError;
use clap::{Args, Subcommand};
use model::{
    core::value::Value,
    transform::mapping::{ColumnMappings, MappingSpec},
};

#[derive(Subcommand)]
pub enum Commands {
    /// List migration jobs in creation order
    List {
        #[arg(long, help = "Print the jobs as JSON")]
        json: bool,
    },
    /// Show one job in full
    Show {
        id: String,

        #[arg(long, help = "Print the job as JSON")]
        json: bool,
    },
    /// Define a new migration job
    Create {
        #[arg(long, help = "Source table name")]
        source: String,

        #[arg(long, help = "Target table name")]
        target: String,

        #[command(flatten)]
        mappings: MappingArgs,
    },
    /// Change a job's tables or mappings
    Edit {
        id: String,

        #[arg(long, help = "New source table name")]
        source: Option<String>,

        #[arg(long, help = "New target table name")]
        target: Option<String>,

        #[command(flatten)]
        mappings: MappingArgs,

        #[arg(
            long = "unmap",
            value_name = "TARGET",
            help = "Remove the mapping for a target attribute"
        )]
        unmap: Vec<String>,
    },
    /// Delete a job definition (refused while it has undo keys, unless forced)
    Delete {
        id: String,

        #[arg(long, help = "Do not ask for confirmation")]
        yes: bool,

        #[arg(long, help = "Also discard the job's undo ledger")]
        force: bool,
    },
    /// Run or resume a job (default: the most recent unfinished one)
    Run {
        id: Option<String>,

        #[arg(long, help = "Do not ask for confirmation before running")]
        yes: bool,

        #[arg(long, help = "Create the target table without asking if it is missing")]
        create_table: bool,
    },
    /// Delete everything a job wrote (default: the most recent job with a ledger)
    Undo {
        id: Option<String>,

        #[arg(long, help = "Do not ask for confirmation")]
        yes: bool,
    },
    /// Show recorded undo keys
    Ledger {
        id: Option<String>,

        #[arg(long, help = "Print the keys as JSON")]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct MappingArgs {
    #[arg(
        long,
        conflicts_with_all = ["map", "set"],
        help = "Copy every source attribute as-is"
    )]
    pub passthrough: bool,

    #[arg(
        long,
        value_delimiter = ',',
        requires = "passthrough",
        help = "Attributes left out by --passthrough, comma separated"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long,
        value_name = "TARGET=TEMPLATE",
        help = "Build a target attribute from a template, e.g. 'name={first} {last upper}'"
    )]
    pub map: Vec<String>,

    #[arg(
        long,
        value_name = "TARGET=VALUE",
        help = "Write a constant; VALUE is parsed as JSON, else taken as a string"
    )]
    pub set: Vec<String>,
}

impl MappingArgs {
    pub fn is_empty(&self) -> bool {
        !self.passthrough && self.map.is_empty() && self.set.is_empty()
    }

    /// Mappings for a new job.
    pub fn build(&self) -> Result<ColumnMappings, CliError> {
        if self.is_empty() {
            return Err(CliError::InvalidArgument(
                "either --passthrough or at least one --map/--set is required".into(),
            ));
        }
        self.apply_to(ColumnMappings::new())
    }

    /// Applies these arguments on top of `current`. `--passthrough` replaces
    /// everything; `--map` and `--set` add or replace single attributes and
    /// drop a previous passthrough.
    pub fn apply_to(&self, current: ColumnMappings) -> Result<ColumnMappings, CliError> {
        if self.passthrough {
            return Ok(ColumnMappings::passthrough(self.exclude.iter().cloned()));
        }

        let mut mappings = if current.passthrough_exclude().is_some() && !self.is_empty() {
            ColumnMappings::new()
        } else {
            current
        };

        for raw in &self.map {
            let (target, spec) = ColumnMappings::parse_assignment(raw)?;
            mappings.insert(target, spec);
        }
        for raw in &self.set {
            let (target, value) = parse_literal(raw)?;
            mappings.insert(target, MappingSpec::Literal { value });
        }
        Ok(mappings)
    }
}

fn parse_literal(raw: &str) -> Result<(String, Value), CliError> {
    let (target, value) = raw.split_once('=').ok_or_else(|| {
        CliError::InvalidArgument(format!("invalid --set '{raw}': expected 'target=value'"))
    })?;
    let target = target.trim();
    if target.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "invalid --set '{raw}': target attribute is required"
        )));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value.trim()) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::string(value.trim()),
    };
    Ok((target.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_passthrough_with_exclusions() {
        let args = MappingArgs {
            passthrough: true,
            exclude: vec!["ssn".into(), "dob".into()],
            ..Default::default()
        };
        let mappings = args.build().unwrap();
        let exclude = mappings.passthrough_exclude().unwrap();
        assert!(exclude.contains("ssn") && exclude.contains("dob"));
    }

    #[test]
    fn builds_templates_and_literals() {
        let args = MappingArgs {
            map: vec!["full={first} {last}".into()],
            set: vec!["version=2".into(), "origin=legacy".into()],
            ..Default::default()
        };
        let mappings = args.build().unwrap();
        assert_eq!(
            mappings.get("full"),
            Some(&MappingSpec::template("{first} {last}"))
        );
        assert_eq!(mappings.get("version"), Some(&MappingSpec::literal(2i64)));
        assert_eq!(mappings.get("origin"), Some(&MappingSpec::literal("legacy")));
    }

    #[test]
    fn map_replaces_previous_passthrough() {
        let args = MappingArgs {
            map: vec!["id={id}".into()],
            ..Default::default()
        };
        let mappings = args
            .apply_to(ColumnMappings::passthrough(["ssn"]))
            .unwrap();
        assert!(mappings.passthrough_exclude().is_none());
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn rejects_missing_mappings() {
        assert!(MappingArgs::default().build().is_err());
    }
}
