pub mod flutterwave;
pub mod paystack;

pub use flutterwave::FlutterwaveProvider;
pub use paystack::PaystackProvider;
