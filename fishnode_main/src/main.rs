// Fishnode: a distance-vector routed Layer-3 node for fishnet
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use clap::Parser;
use fishnode::printer;
use fishnode::types::{FishAddr, PROTO_ECHO};
use fishnode::Fishnet;
use log::*;

/// Run a simulated fishnet of fishnodes connected in a line and display
/// their routing state once the clock has run.
#[derive(Parser, Debug)]
#[command(name = "fishnode_main")]
struct Args {
    /// Number of nodes in the line topology.
    #[arg(long, default_value_t = 4)]
    nodes: u32,

    /// Simulated runtime in seconds before the tables are displayed.
    #[arg(long, default_value_t = 120)]
    seconds: u64,

    /// Address of the first node; the others follow consecutively.
    #[arg(long, default_value = "10.0.0.1")]
    base: FishAddr,

    /// Which tables to display: route, dv, neighbors or all.
    #[arg(long, default_value = "all")]
    show: String,
}

fn main() {
    pretty_env_logger::init();
    let args = Args::parse();

    let addrs: Vec<FishAddr> =
        (0..args.nodes).map(|i| FishAddr(args.base.raw() + i)).collect();
    let mut net = Fishnet::new();
    for &addr in &addrs {
        net.add_node(addr);
    }
    for pair in addrs.windows(2) {
        net.add_link(pair[0], pair[1]);
    }

    net.start();
    net.run_for(args.seconds * 1_000);

    // exercise the data path once end to end
    if let (Some(&first), Some(&last)) = (addrs.first(), addrs.last()) {
        if first != last {
            let id = net.send(first, b"fishnode demo", last, PROTO_ECHO, 0);
            net.run_for(1_000);
            let delivered = net
                .deliveries(last)
                .iter()
                .filter(|d| d.proto == PROTO_ECHO)
                .count();
            info!("probe {} from {} reached {} {} time(s)", id, first, last, delivered);
        }
    }

    for &addr in &addrs {
        println!("=== node {} ===", addr);
        let node = net.node(addr);
        if args.show == "route" || args.show == "all" {
            print!("{}", printer::forwarding_table(node));
        }
        if args.show == "dv" || args.show == "all" {
            print!("{}", printer::dv_table(node));
        }
        if args.show == "neighbors" || args.show == "all" {
            print!("{}", printer::neighbor_table(node));
        }
        println!();
    }
}
