use alloy::sol;

// Contract bindings used by the token loader, pool fetcher, quoting and the router call encoder.
sol! {
    /// Minimal ERC20 interface: the metadata reads of the token loader plus allowance handling.
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string memory);

        function symbol() external view returns (string memory);

        /// Number of decimals, e.g. 18 for WETH and 6 for USDC.
        function decimals() external view returns (uint8);

        function balanceOf(address account) external view returns (uint256);

        function allowance(address owner, address spender) external view returns (uint256);

        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// The two Uniswap V3 pool reads needed to reconstruct pool state.
    #[sol(rpc)]
    interface IUniswapV3Pool {
        /// In-range liquidity at the current tick.
        function liquidity() external view returns (uint128);

        /// Current price and tick, plus oracle bookkeeping that is ignored here.
        function slot0()
            external
            view
            returns (
                uint160 sqrtPriceX96,
                int24 tick,
                uint16 observationIndex,
                uint16 observationCardinality,
                uint16 observationCardinalityNext,
                uint8 feeProtocol,
                bool unlocked
            );
    }

    /// Uniswap V2 pair reserves.
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    /// Uniswap V2 Router02 quoting functions.
    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);

        function getAmountsIn(uint256 amountOut, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    /// Uniswap V3 QuoterV2. Not a view contract, only ever invoked through `eth_call`.
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        struct QuoteExactOutputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amount;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);

        function quoteExactOutputSingle(QuoteExactOutputSingleParams memory params)
            external
            returns (uint256 amountIn, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);

        /// `path` is the packed (token, fee, token, ...) encoding.
        function quoteExactInput(bytes memory path, uint256 amountIn)
            external
            returns (uint256 amountOut, uint160[] memory sqrtPriceX96AfterList, uint32[] memory initializedTicksCrossedList, uint256 gasEstimate);

        /// `path` is the packed encoding in reverse order (output token first).
        function quoteExactOutput(bytes memory path, uint256 amountOut)
            external
            returns (uint256 amountIn, uint160[] memory sqrtPriceX96AfterList, uint32[] memory initializedTicksCrossedList, uint256 gasEstimate);
    }

    /// Uniswap SwapRouter02: V2 and V3 swap entry points plus the deadline multicall.
    ///
    /// Only used for call encoding; transactions are submitted through a `TransactionSigner`.
    interface ISwapRouter02 {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        struct ExactInputParams {
            bytes path;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
        }

        struct ExactOutputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountOut;
            uint256 amountInMaximum;
            uint160 sqrtPriceLimitX96;
        }

        struct ExactOutputParams {
            bytes path;
            address recipient;
            uint256 amountOut;
            uint256 amountInMaximum;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);

        function exactInput(ExactInputParams calldata params) external payable returns (uint256 amountOut);

        function exactOutputSingle(ExactOutputSingleParams calldata params) external payable returns (uint256 amountIn);

        function exactOutput(ExactOutputParams calldata params) external payable returns (uint256 amountIn);

        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to)
            external
            payable
            returns (uint256 amountOut);

        function swapTokensForExactTokens(uint256 amountOut, uint256 amountInMax, address[] calldata path, address to)
            external
            payable
            returns (uint256 amountIn);

        function multicall(uint256 deadline, bytes[] calldata data) external payable returns (bytes[] memory results);
    }
}
