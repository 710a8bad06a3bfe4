// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for cgforge.

use clap::Parser;

use cgforge::cli::{validate_cli, Cli, OutputFormat};
use cgforge::engine::run;

fn main() {
    let cli = Cli::parse();
    let config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match run(&config) {
        Ok(report) => {
            match config.format {
                OutputFormat::Json => println!("{}", report.render_json()),
                OutputFormat::Text => print!("{}", report.render_text()),
            }
            if report.has_unknown() && config.verbose {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
