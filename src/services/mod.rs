pub mod methods;
pub mod wallet;
pub mod withdrawal;

pub use methods::MethodService;
pub use wallet::WalletService;
pub use withdrawal::WithdrawalService;
