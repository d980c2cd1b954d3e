//! 场所演示应用
//!
//! ```text
//! GET    /docs
//! GET    /venue/:venueReference
//! GET    /api/v1/venue-short/:extId
//! GET    /favs                    (需要登录：APP_DEMO_LOGGED_IN=true)
//! GET    /api/v1/search-favs
//! POST   /api/v1/favs/:extId
//! DELETE /api/v1/favs/:extId
//! ```

mod controllers;
mod models;

use std::any::type_name;
use std::sync::Arc;

use dogcafe_core::prelude::*;
use dogcafe_web::prelude::*;

use controllers::{BasicController, FavouriteController, Session, VenueController};
use models::{FavouriteStore, InMemoryVenueRepository, VenueRepository};

fn application() -> WebApplication {
    let venues: Arc<dyn VenueRepository> = Arc::new(InMemoryVenueRepository::seeded());

    WebApplication::new("venue-demo")
        .config_file("demos/venue-demo/application.toml")
        .controller::<BasicController>()
        .controller::<VenueController>()
        .controller::<FavouriteController>()
        .component::<Session>()
        .class(ClassDescriptor::new::<FavouriteStore>())
        .instruction(type_name::<dyn VenueRepository>(), Instruction::service(venues))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = application().logging_from_config().build()?;

    tracing::info!(
        "Listening on http://{} ({} mode)",
        app.server_properties().address(),
        app.app_properties().env
    );

    app.run().await?;
    Ok(())
}
