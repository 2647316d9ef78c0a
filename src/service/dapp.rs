use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{Json, ServerHandler, tool, tool_handler, tool_router};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::config::Config;
use crate::repository::{
    AlloyEthereumRepository, AlloyWalletProvider, EthereumRepository, WalletProvider,
    WalletSource, local_wallet,
};
use crate::service::notify::{NotificationCenter, Notifier, display_message};
use crate::service::swap::{SwapExecutor, SwapSettings};
use crate::service::token::TokenLoader;
use crate::service::token_registry::TokenRegistry;
use crate::service::types::{
    ConnectWalletResponse, ConnectWalletResult, DisconnectWalletResponse, LoadTokenRequest,
    LoadTokenResponse, LoadTokenResult, NotificationsResponse, SwapTokensRequest,
    SwapTokensResponse, SwapTokensResult,
};
use crate::service::utils::format_balance;
use crate::service::wallet::{WalletConnector, WalletSession};
use crate::service::{ServiceError, ServiceResult};

/// Chain access shared by every client session.
pub struct SwapBackend {
    repository: Arc<dyn EthereumRepository>,
    wallet: Option<Arc<dyn WalletProvider>>,
    registry: Arc<TokenRegistry>,
    settings: SwapSettings,
    /// Held while any session swaps, since all sessions sign with the same wallet.
    swapping: AtomicBool,
}

impl SwapBackend {
    pub fn new(
        repository: Arc<dyn EthereumRepository>,
        wallet: Option<Arc<dyn WalletProvider>>,
        registry: Arc<TokenRegistry>,
        settings: SwapSettings,
    ) -> Self {
        Self {
            repository,
            wallet,
            registry,
            settings,
            swapping: AtomicBool::new(false),
        }
    }

    /// Builds the provider, the repository and, when configured, the wallet.
    pub fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let rpc_url = config.rpc.url.parse()?;
        let settings = SwapSettings::from_config(config)?;
        let timeout = config.swap.confirmation_timeout();

        let (provider, source) = if !config.wallet.private_key.is_empty() {
            let (wallet, address) = local_wallet(&config.wallet.private_key)?;
            tracing::info!("Using local wallet {address}");
            let provider = ProviderBuilder::new().wallet(wallet).connect_http(rpc_url);
            (provider.erased(), Some(WalletSource::Local(address)))
        } else if config.wallet.node_accounts {
            tracing::info!("Using accounts managed by the RPC node");
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            (provider.erased(), Some(WalletSource::Node))
        } else {
            tracing::warn!("No wallet configured. Swaps are disabled until one is set up.");
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            (provider.erased(), None)
        };

        let provider: Arc<DynProvider> = Arc::new(provider);

        let repository = AlloyEthereumRepository::new(
            provider.clone(),
            config.uniswap.quoter_v2,
            config.uniswap.v2_router,
        );

        let wallet = source.map(|source| {
            Arc::new(AlloyWalletProvider::new(provider.clone(), source, timeout))
                as Arc<dyn WalletProvider>
        });

        Ok(Arc::new(Self::new(
            Arc::new(repository),
            wallet,
            Arc::new(TokenRegistry::new()),
            settings,
        )))
    }
}

/// Released when the swap finishes, however it ends.
struct SwapGuard<'a>(&'a AtomicBool);

impl<'a> SwapGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> ServiceResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                ServiceError::SwapInProgress(
                    "Wait for the current swap to finish".to_string(),
                )
            })?;
        Ok(Self(flag))
    }
}

impl Drop for SwapGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One client session: a wallet connection and its notifications.
pub struct TokenSwapService {
    tool_router: ToolRouter<Self>,
    backend: Arc<SwapBackend>,
    session: RwLock<Option<WalletSession>>,
    notifier: NotificationCenter,
}

// MCP Tool Layer
#[tool_router]
impl TokenSwapService {
    pub fn new(backend: Arc<SwapBackend>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            backend,
            session: RwLock::new(None),
            notifier: NotificationCenter::new(),
        }
    }

    #[instrument(skip(self))]
    #[tool(description = "Connect the configured wallet and open a session on its first account")]
    pub async fn connect_wallet(&self) -> Json<ConnectWalletResult> {
        match self.connect_wallet_impl().await {
            Ok(response) => Json(ConnectWalletResult::Success(response)),
            Err(e) => {
                self.report(&e);
                Json(ConnectWalletResult::Error { error: e })
            }
        }
    }

    #[instrument(skip(self))]
    #[tool(description = "Close the wallet session")]
    pub async fn disconnect_wallet(&self) -> Json<DisconnectWalletResponse> {
        let previous = self.session.write().await.take();
        if let Some(session) = &previous {
            tracing::info!("Wallet disconnected: {}", session.short_address());
        }

        Json(DisconnectWalletResponse {
            was_connected: previous.is_some(),
            address: previous.map(|s| s.address.to_string()),
        })
    }

    #[instrument(skip(self))]
    #[tool(description = "Load ERC20 token metadata and the balance of the connected account")]
    pub async fn load_token(
        &self,
        Parameters(req): Parameters<LoadTokenRequest>,
    ) -> Json<LoadTokenResult> {
        match self.load_token_impl(req).await {
            Ok(response) => Json(LoadTokenResult::Success(response)),
            Err(e) => {
                self.report(&e);
                Json(LoadTokenResult::Error { error: e })
            }
        }
    }

    #[instrument(skip(self))]
    #[tool(
        description = "Swap tokens through the Uniswap SwapRouter02 using the connected wallet. Waits for one confirmation."
    )]
    pub async fn swap_tokens(
        &self,
        Parameters(req): Parameters<SwapTokensRequest>,
    ) -> Json<SwapTokensResult> {
        match self.swap_tokens_impl(req).await {
            Ok(response) => {
                self.notifier
                    .notify_success(&format!("Swap confirmed: {}", response.tx_hash));
                Json(SwapTokensResult::Success(response))
            }
            Err(e) => {
                self.report(&e);
                Json(SwapTokensResult::Error { error: e })
            }
        }
    }

    #[instrument(skip(self))]
    #[tool(description = "List notifications from the last few seconds")]
    pub async fn notifications(&self) -> Json<NotificationsResponse> {
        Json(NotificationsResponse {
            notifications: self.notifier.active(),
        })
    }
}

// Business Logic - Core implementation
impl TokenSwapService {
    pub async fn session(&self) -> Option<WalletSession> {
        *self.session.read().await
    }

    pub fn notifier(&self) -> &NotificationCenter {
        &self.notifier
    }

    fn report(&self, error: &ServiceError) {
        self.notifier.notify_error(&display_message(error));
    }

    #[instrument(skip(self), err)]
    async fn connect_wallet_impl(&self) -> ServiceResult<ConnectWalletResponse> {
        let session = WalletConnector::connect(self.backend.wallet.as_deref()).await?;
        *self.session.write().await = Some(session);

        Ok(ConnectWalletResponse {
            address: session.address.to_string(),
            short_address: session.short_address(),
            chain_id: session.chain_id,
        })
    }

    #[instrument(skip(self), err)]
    async fn load_token_impl(&self, req: LoadTokenRequest) -> ServiceResult<LoadTokenResponse> {
        let session = self.session().await;

        let owner = match (req.owner.as_deref(), session) {
            (Some(owner), _) => Address::from_str(owner.trim())
                .map_err(|e| ServiceError::InvalidTrade(format!("Invalid owner address: {e}")))?,
            (None, Some(session)) => session.address,
            (None, None) => return Err(ServiceError::not_connected()),
        };
        let chain_id = match session {
            Some(session) => session.chain_id,
            None => self.backend.repository.chain_id().await?,
        };

        let loader = TokenLoader::new(self.backend.repository.as_ref(), &self.backend.registry);
        let token = loader.load(&req.token, chain_id, owner).await?;

        Ok(LoadTokenResponse {
            chain_id: token.chain_id,
            address: token.address.to_string(),
            formatted_balance: format_balance(token.balance, token.decimals),
            balance: token.balance.to_string(),
            symbol: token.symbol,
            name: token.name,
            decimals: token.decimals,
        })
    }

    #[instrument(skip(self), err)]
    async fn swap_tokens_impl(&self, req: SwapTokensRequest) -> ServiceResult<SwapTokensResponse> {
        let _guard = SwapGuard::claim(&self.backend.swapping)?;

        let session = self.session().await.ok_or_else(ServiceError::not_connected)?;
        let wallet = self
            .backend
            .wallet
            .as_ref()
            .ok_or_else(ServiceError::wallet_not_installed)?;
        let signer = wallet.signer(session.address)?;

        let executor = SwapExecutor::new(
            self.backend.repository.clone(),
            signer,
            self.backend.registry.clone(),
            self.backend.settings.clone(),
        );

        executor.execute(&session, &req).await
    }
}

#[tool_handler]
impl ServerHandler for TokenSwapService {}
