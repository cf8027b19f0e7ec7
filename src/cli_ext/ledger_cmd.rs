//! `ledger show` and `ledger update`.

use anyhow::Result;
use tabled::{Table, Tabled};

use crate::{
    cli::{AppContext, LedgerAction, LedgerArgs, OutputFormat},
    core::{ledger::FailureLedger, render::render_ledger},
    infra::config::load_config,
};

#[derive(Tabled)]
struct LedgerRow
{
    test: String,
    failures: u64,
}

pub fn run(
    args: LedgerArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load_config()?;
    let mut ledger = FailureLedger::load(&config.ledger_path)?;

    match args.action
    {
        LedgerAction::Show { format } => match format
        {
            OutputFormat::Text => print!("{}", render_ledger(&ledger, ctx)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ledger.counts())?),
            OutputFormat::Table =>
            {
                let rows = ledger
                    .counts()
                    .iter()
                    .map(|(test, n)| LedgerRow { test: test.clone(), failures: *n });
                println!("{}", Table::new(rows));
            }
        },

        LedgerAction::Update { report } =>
        {
            let report = report.unwrap_or(config.report_path);

            if ctx.dry_run
            {
                println!(
                    "Would fold {} into {}",
                    report.display(),
                    ledger
                        .path()
                        .display()
                );
                return Ok(());
            }

            let recorded = ledger.update(&report)?;
            if !ctx.quiet
            {
                println!(
                    "Recorded {recorded} failure(s) in {}",
                    ledger
                        .path()
                        .display()
                );
            }
        }
    }
    Ok(())
}
