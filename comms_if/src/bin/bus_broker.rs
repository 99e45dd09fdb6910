//! Message bus broker
//!
//! Forwards every frame published on the XSUB endpoint to every subscriber of the XPUB endpoint.

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "bus_broker")]
struct Opt {
    /// Endpoint publishers connect to
    #[structopt(long, default_value = "tcp://*:5559")]
    xsub: String,

    /// Endpoint subscribers connect to
    #[structopt(long, default_value = "tcp://*:5560")]
    xpub: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let ctx = zmq::Context::new();

    let frontend = ctx.socket(zmq::XSUB)?;
    frontend.bind(&opt.xsub)?;

    let backend = ctx.socket(zmq::XPUB)?;
    backend.bind(&opt.xpub)?;

    println!(
        "Bus broker running, publishers on {}, subscribers on {}",
        opt.xsub, opt.xpub
    );

    zmq::proxy(&frontend, &backend)?;

    Ok(())
}
