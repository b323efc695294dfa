mod alerts;
mod profiles;
mod readings;
