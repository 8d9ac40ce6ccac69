use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use termcolor::{Color, ColorSpec, WriteColor};

use imprint_core::change::ChangeLog;
use imprint_core::config::{validate_config, Environment, SiteConfig};
use imprint_core::schema::catalog::SchemaCatalog;
use imprint_core::schema::map::open_map;
use imprint_core::schema::validator::validate;
use imprint_store::{Store, StoreConfig};

use crate::args::SiteArgs;
use crate::output;

#[derive(Debug, Serialize)]
pub struct CheckOut {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct ConsoleOut {
    pub ok: bool,
    pub checks: Vec<CheckOut>,
}

fn check(name: &str, result: Result<String, String>) -> CheckOut {
    match result {
        Ok(detail) => CheckOut {
            name: name.to_string(),
            ok: true,
            detail,
        },
        Err(detail) => CheckOut {
            name: name.to_string(),
            ok: false,
            detail,
        },
    }
}

pub fn run(site: &SiteArgs) -> Result<()> {
    let mut checks = Vec::new();

    let environment = Environment::parse(&site.environment)?;
    let config = SiteConfig::for_root(&site.site, environment);

    checks.push(check(
        "site.root",
        if Path::new(&site.site).is_dir() {
            Ok(format!("{} exists", site.site))
        } else {
            Err(format!("{} is not a directory", site.site))
        },
    ));

    checks.push(check(
        "site.config",
        validate_config(&config)
            .map(|_| format!("environment {}", environment.as_str()))
            .map_err(|e| e.to_string()),
    ));

    let catalog = SchemaCatalog::from_json_file(&config.schema_def);
    checks.push(check(
        "schema.catalog",
        catalog
            .as_ref()
            .map(|c| format!("{} types declared", c.types().len()))
            .map_err(|e| e.to_string()),
    ));

    let map = open_map(&config.schema_map);
    checks.push(check(
        "schema.map",
        map.as_ref()
            .map(|_| {
                if config.schema_map.exists() {
                    format!("persistent map at {}", config.schema_map.display())
                } else {
                    "no backing file; transient strategy".to_string()
                }
            })
            .map_err(|e| e.to_string()),
    ));

    if let (Ok(catalog), Ok(map)) = (&catalog, &map) {
        checks.push(check(
            "schema.validation",
            validate(catalog, map.as_ref())
                .map(|_| "consistent".to_string())
                .map_err(|e| e.to_string()),
        ));
    }

    match Store::open(StoreConfig::local(&config.root)) {
        Ok(store) => {
            checks.push(check(
                "store.changes",
                store
                    .pending()
                    .map(|p| format!("{} pending", p.len()))
                    .map_err(|e| e.to_string()),
            ));
            checks.push(check(
                "store.revisions",
                store
                    .revision_history()
                    .map(|h| format!("{} published", h.len()))
                    .map_err(|e| e.to_string()),
            ));
        }
        Err(e) => checks.push(check("store.open", Err(e.to_string()))),
    }

    let ok = checks.iter().all(|c| c.ok);

    if output::is_json() {
        output::print(&ConsoleOut { ok, checks })?;
    } else {
        let mut stdout = output::stdout();
        for c in &checks {
            let (tag, color) = if c.ok { ("ok", Color::Green) } else { ("fail", Color::Red) };
            stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
            write!(stdout, "{tag:>6}")?;
            stdout.reset()?;
            writeln!(stdout, "  {}  {}", c.name, c.detail)?;
        }
    }

    if ok {
        Ok(())
    } else {
        Err(anyhow::anyhow!("console checks failed"))
    }
}
