use crate::Sampler;
use anyhow::Result;
use std::time::Instant;
use sysinfo::Networks;
use wattmon_common::record::NodeRecord;

const KB: f64 = 1024.0;

pub struct NetworkSampler {
    networks: Networks,
    prev_received: u64,
    prev_transmitted: u64,
    last: Instant,
}

impl NetworkSampler {
    pub fn new() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let (received, transmitted, _, _) = totals(&networks);
        Self {
            networks,
            prev_received: received,
            prev_transmitted: transmitted,
            last: Instant::now(),
        }
    }
}

impl Default for NetworkSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn totals(networks: &Networks) -> (u64, u64, u64, u64) {
    let mut received = 0u64;
    let mut transmitted = 0u64;
    let mut packets_received = 0u64;
    let mut packets_transmitted = 0u64;
    for (_, data) in networks.iter() {
        received += data.total_received();
        transmitted += data.total_transmitted();
        packets_received += data.total_packets_received();
        packets_transmitted += data.total_packets_transmitted();
    }
    (received, transmitted, packets_received, packets_transmitted)
}

impl Sampler for NetworkSampler {
    fn name(&self) -> &'static str {
        "network"
    }

    fn sample(&mut self, record: &mut NodeRecord) -> Result<()> {
        self.networks.refresh();
        let (received, transmitted, packets_received, packets_transmitted) =
            totals(&self.networks);
        let elapsed = self.last.elapsed().as_secs_f64();
        self.last = Instant::now();

        record.network.packets_received = packets_received as i64;
        record.network.packets_sent = packets_transmitted as i64;
        if elapsed > 0.0 {
            let rx_delta = received.saturating_sub(self.prev_received);
            let tx_delta = transmitted.saturating_sub(self.prev_transmitted);
            record.network.receive_rate = rx_delta as f64 / KB / elapsed;
            record.network.send_rate = tx_delta as f64 / KB / elapsed;
        }
        self.prev_received = received;
        self.prev_transmitted = transmitted;
        Ok(())
    }
}
