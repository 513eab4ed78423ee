pub mod fluid_2d;
