//! Weather data collaborators: the OpenWeatherMap client and the description model.

mod model;
mod sdk;

pub use model::{WeatherError, WeatherModel};
pub use sdk::{
    OpenWeatherMapClient, SdkError, WeatherCondition, WeatherData, WeatherSource, WEATHER_API_PATH,
};
