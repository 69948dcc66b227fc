//! The `home` command.

use anyhow::Result;
use grid_core::home::HomeLocation;

/// Arguments for the home command.
#[derive(Debug, clap::Args)]
pub(crate) struct HomeArgs {
    /// Home location, e.g. `{'region_handle':[r256000,r256000], 'position':[r128,r128,r25], 'look_at':[r0,r1,r0]}`
    text: String,
}

pub(crate) fn run(args: &HomeArgs) -> Result<()> {
    let home: HomeLocation = args.text.parse()?;

    println!(
        "region handle: ({}, {})",
        home.region_handle.0, home.region_handle.1
    );
    println!("global:        ({}, {})", home.global_x(), home.global_y());
    println!(
        "local:         ({}, {}, {})",
        home.local_x(),
        home.local_y(),
        home.local_z()
    );
    println!("position:      {:?}", home.position);
    println!("look at:       {:?}", home.look_at);
    Ok(())
}
