// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use dltree::consensus;
use dltree::global::*;
use dltree::identity::Ed25519Identity;
use dltree::node::*;
use dltree::primitives::*;
use dltree::settings::Settings;
use dltree::wallet::Keypair;
use log::*;
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::time::sleep;
use tracing_subscriber::prelude::*;

#[cfg(not(windows))]
use signal_hook::consts::TERM_SIGNALS;
#[cfg(not(windows))]
use signal_hook::flag;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    #[cfg(not(windows))]
    for sig in TERM_SIGNALS {
        // When terminated by a second term signal, exit with exit code 1.
        // This will do nothing the first time (because term_now is false).
        flag::register_conditional_shutdown(*sig, 1, EXIT_SIGNAL.clone())?;
        // But this will "arm" the above for the second time, by setting it to true.
        // The order of registering these is important, if you put this one first, it will
        // first arm and then terminate ‒ all in the first round.
        flag::register(*sig, EXIT_SIGNAL.clone())?;
    }

    let settings = Settings::new()?;
    settings.validate()?;

    let runtime = Builder::new_multi_thread()
        .worker_threads(settings.node.worker_threads())
        .enable_io()
        .enable_time()
        .build()?;

    runtime.block_on(async {
        init_tracing()?;
        run_devnet(settings).await
    })
}

/// Runs an in-process network: the first `validators` nodes produce
/// blocks, a faucet keeps spending the genesis output through the last one.
async fn run_devnet(settings: Settings) -> anyhow::Result<()> {
    info!(
        "Running dltree v{} devnet: {} nodes, {} validators, app id {}",
        env!("CARGO_PKG_VERSION"),
        settings.devnet.nodes,
        settings.devnet.validators,
        settings.network.app_id
    );

    let faucet = Keypair::generate();
    let coinbase = Transaction::new(Hash256::zero(), faucet.lock(), vec![]);
    let genesis = Block::genesis(vec![coinbase.clone()]);
    info!("Genesis block {}", genesis.hash());

    let validators: Vec<_> = (0..settings.devnet.validators)
        .map(|_| Keypair::generate())
        .collect();
    let mut consensus_settings = settings.consensus.clone();
    consensus_settings
        .authorized_keys
        .extend(validators.iter().map(Keypair::public_hex));

    let net = MemoryNetwork::new();
    let mut nodes = Vec::with_capacity(settings.devnet.nodes as usize);

    for i in 0..settings.devnet.nodes {
        let addr = SocketAddr::from(([127, 0, 0, 1], settings.devnet.base_port + i as u16));
        let mut node_consensus = consensus_settings.clone();
        node_consensus.signing_key = validators.get(i as usize).map(Keypair::secret_hex);

        let consensus = consensus::from_settings(&node_consensus, Arc::new(Ed25519Identity))?;
        let (transport, inbound) = net.join(addr);
        let node = NodeBuilder::new()
            .config(NodeConfig {
                app_id: settings.network.app_id.clone(),
                is_validator: i < settings.devnet.validators,
                msg_timeout: settings.network.msg_timeout(),
                ..Default::default()
            })
            .genesis(genesis.clone())
            .consensus(consensus)
            .transport(Arc::new(transport))
            .peers(Arc::new(net.discovery(addr)))
            .build()?;

        tokio::spawn(node.clone().run(inbound));
        node.start()?;
        nodes.push(node);
    }

    if let Some(entry) = nodes.last().cloned() {
        tokio::spawn(run_faucet(
            entry,
            faucet,
            coinbase,
            settings.devnet.faucet_spends,
            Duration::from_millis(settings.devnet.spend_interval_ms),
        ));
    }

    tokio::select!(
        _ = tokio::spawn(report_heights(nodes.clone())) => (),
        _ = check_exit_signal() => (),
    );

    for node in nodes.iter() {
        node.stop();
    }

    Ok(())
}

/// Submits a chain of self-spends starting at the genesis output
#[tracing::instrument(skip_all)]
async fn run_faucet(
    node: Arc<Node>,
    faucet: Keypair,
    coinbase: Transaction,
    spends: u64,
    interval: Duration,
) {
    let mut prev = coinbase;

    for i in 0..spends {
        sleep(interval).await;
        let tx = faucet.spend(&prev, faucet.lock());
        info!("Faucet spend {}/{}: {}", i + 1, spends, tx.hash());
        node.submit_transaction(tx.clone());
        prev = tx;
    }

    info!("Faucet done");
}

async fn report_heights(nodes: Vec<Arc<Node>>) {
    loop {
        sleep(Duration::from_secs(5)).await;

        for node in nodes.iter() {
            let deepest = node.deepest_hashes();
            info!(
                "[{}] {} blocks, {} deepest ({}), {} pending tx, producer {:?}",
                node.local_addr(),
                node.block_count(),
                deepest.len(),
                deepest
                    .first()
                    .map(|h| h.to_hex())
                    .unwrap_or_default(),
                node.mempool_len(),
                node.producer_status()
            );
        }
    }
}

async fn check_exit_signal() {
    while !should_exit() {
        sleep(Duration::from_millis(10)).await;
    }

    info!("dltree v{} shutting down...", env!("CARGO_PKG_VERSION"));
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
