use alloy_chains::Chain;
use aurelius_bundler::{
    Bundler, BundlerService, ConditionalClient, EthereumClient, SendBundleOp,
};
use aurelius_contracts::EntryPoint;
use aurelius_mempool::{
    mempool_in_memory, new_canonical, new_canonical_unsafe, reputation_in_memory, UoPool,
    UoPoolHandle, UserOperationValidator,
};
use aurelius_primitives::{
    constants::validation::reputation::{BAN_SLACK, THROTTLING_SLACK},
    UoPoolMode, Wallet,
};
use aurelius_rpc::{
    DebugApiServer, DebugApiServerImpl, EthApiServer, EthApiServerImpl, JsonRpcServer,
};
use clap::Parser;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::U256,
};
use eyre::format_err;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::Opts;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();

    let eth_client = Arc::new(Provider::<Http>::try_from(opts.eth_client_address.clone())?);
    let chain_id = eth_client.get_chainid().await?;
    let chain = Chain::from_id(chain_id.as_u64());

    info!(
        "Connected to the Ethereum execution client at {}: {}",
        opts.eth_client_address,
        chain.id()
    );

    let wallet = if let Some(path) = opts.mnemonic_file.clone() {
        Wallet::from_file(path, &chain_id)?
    } else if let Some(key) = opts.private_key.clone() {
        Wallet::from_key(&key, &chain_id)?
    } else {
        return Err(format_err!("no signer configured: pass --mnemonic-file or --private-key"));
    };
    info!("Bundler signer: {:?}", wallet.address());

    let entry_point = EntryPoint::new(eth_client.clone(), opts.entry_point);

    match opts.uopool_mode {
        UoPoolMode::Standard => {
            let validator = new_canonical(
                entry_point.clone(),
                chain,
                opts.max_verification_gas,
                opts.min_priority_fee_per_gas,
            );
            run(opts, eth_client, entry_point, chain, wallet, validator).await
        }
        UoPoolMode::Unsafe => {
            let validator = new_canonical_unsafe(
                entry_point.clone(),
                chain,
                opts.max_verification_gas,
                opts.min_priority_fee_per_gas,
            );
            run(opts, eth_client, entry_point, chain, wallet, validator).await
        }
    }
}

async fn run<V>(
    opts: Opts,
    eth_client: Arc<Provider<Http>>,
    entry_point: EntryPoint<Provider<Http>>,
    chain: Chain,
    wallet: Wallet,
    validator: V,
) -> eyre::Result<()>
where
    V: UserOperationValidator + 'static,
{
    let uopool: UoPoolHandle<Provider<Http>, V> = Arc::new(Mutex::new(UoPool::new(
        entry_point.clone(),
        validator,
        mempool_in_memory(),
        reputation_in_memory(
            THROTTLING_SLACK,
            BAN_SLACK,
            opts.min_stake,
            opts.min_unstake_delay.into(),
        ),
        U256::from(opts.max_bundle_gas),
        opts.mempool_max_size,
        chain,
        opts.conditional_rpc,
    )));

    if opts.conditional_rpc {
        let client = ConditionalClient::new(eth_client.clone(), wallet.clone());
        serve(opts, entry_point, chain, wallet, uopool, client).await
    } else {
        let client = EthereumClient::new(eth_client.clone(), wallet.clone());
        serve(opts, entry_point, chain, wallet, uopool, client).await
    }
}

async fn serve<V, S>(
    opts: Opts,
    entry_point: EntryPoint<Provider<Http>>,
    chain: Chain,
    wallet: Wallet,
    uopool: UoPoolHandle<Provider<Http>, V>,
    client: S,
) -> eyre::Result<()>
where
    V: UserOperationValidator + 'static,
    S: SendBundleOp + Clone,
{
    let bundler = Bundler::new(
        wallet,
        opts.beneficiary,
        opts.min_balance,
        entry_point,
        chain,
        client,
    );

    let bundler_service = BundlerService::new(bundler, uopool.clone());
    bundler_service.start_bundling(opts.bundle_interval);

    let (bundle_trigger, wake) = mpsc::unbounded_channel();
    bundler_service.spawn_trigger_listener(wake);

    let mut server =
        JsonRpcServer::new(opts.http_addr, opts.http_port).with_cors(&opts.http_corsdomain);

    server.add_methods(
        EthApiServerImpl {
            uopool: uopool.clone(),
            entry_point: opts.entry_point,
            chain,
            auto_bundle_size: opts.auto_bundle_size,
            bundle_trigger,
        }
        .into_rpc(),
    )?;

    server.add_methods(
        DebugApiServerImpl {
            bundler_service: bundler_service.clone(),
            bundle_interval: opts.bundle_interval,
        }
        .into_rpc(),
    )?;

    let _handle = server.start().await?;
    info!("JSON-RPC server listening on {}:{}", opts.http_addr, opts.http_port);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
