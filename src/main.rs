// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod config;
mod kubernetes;
mod output;
mod sql;

use anyhow::Result;
use clap::Parser;

use cli::Args;
use config::Config;
use kubernetes::KubeLister;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("kubequel=debug")
            .init();
    }

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {e:#}");
        Config::default()
    });

    let namespace = args.namespace.clone().or(config.default_namespace);
    let format = args
        .output
        .clone()
        .or(config.default_output)
        .unwrap_or_default();

    let lister = KubeLister::new(args.kubeconfig.as_deref()).await?;

    match sql::execute_query(&lister, &args.execute, namespace.as_deref()).await {
        Ok(results) => {
            println!("{}", output::render(&results, &format, args.no_headers));
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
