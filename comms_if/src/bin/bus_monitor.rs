//! Simple bus monitor
//!
//! Subscribes to the given topic prefixes (all topics by default) and prints every frame.

use comms_if::{
    bus::BusMsg,
    net::{MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "bus_monitor")]
struct Opt {
    /// Endpoint of the broker's subscriber side
    #[structopt(long, default_value = "tcp://localhost:5560")]
    endpoint: String,

    /// Topic prefixes to subscribe to
    topics: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let ctx = zmq::Context::new();

    let subscriptions = if opt.topics.is_empty() {
        vec![String::new()]
    } else {
        opt.topics.clone()
    };

    let socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        SocketOptions {
            block_on_first_connect: false,
            linger: 0,
            subscriptions,
            ..Default::default()
        },
        &opt.endpoint,
    )?;

    loop {
        let msg = socket.recv_msg(0)?;

        match BusMsg::from_frame(&msg) {
            Ok(m) => {
                // Camera frames are too big to print
                if m.payload.len() > 200 {
                    println!("{}: <{} bytes>", m.topic, m.payload.len());
                } else {
                    println!("{}: {}", m.topic, m.payload);
                }
            }
            Err(e) => println!("Unparsable frame ({}): {:?}", e, msg.as_str()),
        }
    }
}
