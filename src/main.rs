mod checksum;
mod cli;
mod dhcp_starve;
mod error;
mod frame;
mod link;
mod mac;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match starve(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn starve(cli: Cli) -> anyhow::Result<()> {
    link::require_privileges()?;
    let interface = link::resolve_interface(&cli.interface)?;
    let mut link = link::open(&interface)?;

    println!("{}", "dhcp-starve: DHCP pool exhaustion tester".green().bold());
    let warnings = [
        "THIS TOOL IS ONLY FOR PENETRATION TESTING AND NOT FOR ILLEGAL PURPOSES",
        "ONLY RUN IT ON NETWORKS YOU ARE AUTHORISED TO TEST",
    ];
    for warning in warnings.iter() {
        println!("{}", warning.red().bold());
    }

    let delay = cli.delay();
    println!(
        "Sending {} DHCP Discover packets per second on interface {} (index {})...",
        cli.rate.to_string().green().bold(),
        link.name().green().bold(),
        link.index()
    );
    println!("Delay between packets: {} microseconds.", delay.as_micros());
    println!("{}", "Press Ctrl+C to stop.".yellow().bold());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    let mut rng = rand::rng();
    let stats = rt.block_on(dhcp_starve::run(
        &mut link,
        delay,
        &mut rng,
        tokio::signal::ctrl_c(),
        &mut io::stdout(),
    ))?;

    println!("\n{}", "Received Ctrl+C. Stopping DHCP exhaustion...".yellow().bold());
    println!(
        "Sent {} DHCP Discover packets ({} failed).",
        stats.sent.to_string().green().bold(),
        stats.failed
    );
    Ok(())
}
