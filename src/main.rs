use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;

use std::io::Write;

use swinv::render;
use swinv::source::msi;
use swinv::{
    enumerate, EnumerateError, FilterSet, Inventory, PackageScope, QueryOptions, SourceKind,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List programs known to the Win32_InstalledWin32Program WMI class.
    /// Requires an elevated prompt.
    Programs,
    /// List MSIX/UWP application packages.
    Packages {
        /// Also list packages signed as part of the OS.
        #[arg(long)]
        include_system: bool,
        /// Skip shared framework packages.
        #[arg(long)]
        exclude_frameworks: bool,
        /// List packages of all users instead of the current one. Requires an
        /// elevated prompt.
        #[arg(long)]
        all_users: bool,
    },
    /// List products registered with Windows Installer.
    Msi {
        /// Only list products related to this upgrade code,
        /// e.g. {23170F69-40C1-2702-0000-000004000000}.
        #[arg(long, value_name = "GUID", value_parser = parse_guid)]
        upgrade_code: Option<String>,
    },
}

fn parse_guid(s: &str) -> Result<String, String> {
    if msi::is_guid(s) {
        Ok(s.to_string())
    } else {
        Err(format!("{s:?} is not a {{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}} GUID"))
    }
}

impl Command {
    fn selection(&self) -> (SourceKind, QueryOptions, FilterSet) {
        match self {
            Command::Programs => (
                SourceKind::LegacyInstaller,
                QueryOptions::default(),
                FilterSet::default(),
            ),
            Command::Packages {
                include_system,
                exclude_frameworks,
                all_users,
            } => (
                SourceKind::ApplicationPackage,
                QueryOptions {
                    scope: if *all_users {
                        PackageScope::AllUsers
                    } else {
                        PackageScope::CurrentUser
                    },
                    ..Default::default()
                },
                FilterSet {
                    exclude_system_packages: !include_system,
                    exclude_framework_packages: *exclude_frameworks,
                },
            ),
            Command::Msi { upgrade_code } => (
                SourceKind::MsiProduct,
                QueryOptions {
                    upgrade_code: upgrade_code.clone(),
                    ..Default::default()
                },
                FilterSet::default(),
            ),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let (kind, options, filters) = cli.command.selection();
    debug!("source={kind:?} options={options:?} filters={filters:?}");

    // stdout carries only the listing; every diagnostic goes to stderr
    let inventory = match enumerate(kind, &options, &filters) {
        Ok(inventory) => inventory,
        Err(err) => {
            eprintln!("{}", error_line(err));
            std::process::exit(-1);
        }
    };

    if let Err(err) = print(&inventory) {
        eprintln!("ERROR: {err:#}");
        std::process::exit(-1);
    }
}

fn error_line(err: EnumerateError) -> String {
    match err {
        EnumerateError::AccessDenied { .. } => "ERROR: Admin privileges required.".to_string(),
        err => format!("ERROR: {:#}", anyhow::Error::new(err)),
    }
}

fn print(inventory: &Inventory) -> Result<()> {
    let mut out = std::io::stdout().lock();
    render::write_listing(&mut out, &inventory.records).context("writing listing to stdout")?;
    out.flush().context("flushing stdout")?;
    render::write_skipped(&mut std::io::stderr().lock(), &inventory.skipped)
        .context("writing skipped entries to stderr")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn packages_hide_system_by_default() {
        let cli = Cli::try_parse_from(["swinv", "packages"]).unwrap();
        let (kind, options, filters) = cli.command.selection();
        assert_eq!(kind, SourceKind::ApplicationPackage);
        assert_eq!(options.scope, PackageScope::CurrentUser);
        assert!(filters.exclude_system_packages);
        assert!(!filters.exclude_framework_packages);
    }

    #[test]
    fn packages_flags() {
        let cli = Cli::try_parse_from([
            "swinv",
            "packages",
            "--include-system",
            "--exclude-frameworks",
            "--all-users",
        ])
        .unwrap();
        let (_, options, filters) = cli.command.selection();
        assert_eq!(options.scope, PackageScope::AllUsers);
        assert!(!filters.exclude_system_packages);
        assert!(filters.exclude_framework_packages);
    }

    #[test]
    fn programs_and_msi_take_no_filters() {
        for (arg, kind) in [
            ("programs", SourceKind::LegacyInstaller),
            ("msi", SourceKind::MsiProduct),
        ] {
            let cli = Cli::try_parse_from(["swinv", arg]).unwrap();
            let (k, options, filters) = cli.command.selection();
            assert_eq!(k, kind);
            assert_eq!(options, QueryOptions::default());
            assert_eq!(filters, FilterSet::default());
        }
        assert!(Cli::try_parse_from(["swinv", "programs", "--all-users"]).is_err());
    }

    #[test]
    fn msi_upgrade_code() {
        let code = "{23170F69-40C1-2702-0000-000004000000}";
        let cli = Cli::try_parse_from(["swinv", "msi", "--upgrade-code", code]).unwrap();
        let (kind, options, _) = cli.command.selection();
        assert_eq!(kind, SourceKind::MsiProduct);
        assert_eq!(options.upgrade_code.as_deref(), Some(code));

        assert!(Cli::try_parse_from(["swinv", "msi", "--upgrade-code", "7-Zip"]).is_err());
        assert!(Cli::try_parse_from(["swinv", "packages", "--upgrade-code", code]).is_err());
    }

    #[test]
    fn error_lines() {
        let denied = EnumerateError::AccessDenied {
            source_kind: SourceKind::LegacyInstaller,
        };
        assert_eq!(error_line(denied), "ERROR: Admin privileges required.");
        let unavailable = EnumerateError::SourceUnavailable {
            source_kind: SourceKind::MsiProduct,
            cause: swinv::source::SourceError::new("not on Windows"),
        };
        assert_eq!(
            error_line(unavailable),
            "ERROR: Windows Installer inventory is unavailable: not on Windows"
        );
    }
}
