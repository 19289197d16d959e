pub mod demo_cars_seed;
