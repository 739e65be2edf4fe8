pub mod stripe_v2;
