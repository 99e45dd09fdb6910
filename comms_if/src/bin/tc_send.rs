//! Send a single telecommand to the coordinator and print the response.
//!
//! ```text
//! tc_send '{"type": "SET_MODE", "payload": {"mode": "face_tracking"}}'
//! ```

use comms_if::{
    net::{MonitoredSocket, SocketOptions},
    tc::{Tc, TcResponse},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "tc_send")]
struct Opt {
    /// Endpoint of the coordinator's telecommand server
    #[structopt(long, default_value = "tcp://localhost:5570")]
    endpoint: String,

    /// The telecommand as JSON
    tc: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    // Validate locally so typos don't reach the coordinator
    let tc = Tc::from_json(&opt.tc)?;

    let ctx = zmq::Context::new();

    let socket = match MonitoredSocket::new(
        &ctx,
        zmq::REQ,
        SocketOptions {
            connect_timeout: 1000,
            linger: 1,
            recv_timeout: 2000,
            send_timeout: 1000,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        },
        &opt.endpoint,
    ) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the coordinator");
            return Err(e.into());
        }
    };

    socket.send(&tc.to_json()?, 0)?;

    let msg = socket.recv_msg(0)?;
    let response: TcResponse = serde_json::from_slice(&msg)?;

    println!("{} {}", response.code, response.body);

    Ok(())
}
