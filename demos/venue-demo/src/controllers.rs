use std::sync::Arc;

use dogcafe_core::prelude::*;
use dogcafe_web::prelude::*;
use serde_json::json;

use crate::models::{FavouriteStore, VenueRepository};

// ==================== 会话 ====================

/// 演示用的登录状态，由 `demo.logged-in` 配置
pub struct Session {
    logged_in: bool,
}

impl Session {
    /// 未登录时返回 `Unauthenticated`，`redirect` 决定 HTML 客户端是否跳转登录页
    pub fn guard(&self, redirect: bool) -> anyhow::Result<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(WebError::Unauthenticated { redirect }.into())
        }
    }
}

impl Component for Session {
    fn dependencies() -> Vec<Parameter> {
        vec![Parameter::of::<Environment>("environment")]
    }

    fn construct(args: &Arguments) -> anyhow::Result<Self> {
        let environment = args.get::<Environment>("environment")?;
        Ok(Self {
            logged_in: environment.get_bool_or("demo.logged-in", false),
        })
    }
}

fn ext_id(value: &str) -> anyhow::Result<u32> {
    value.parse().map_err(|_| {
        let error = ApiError::with_placeholders(ErrorCode::ParameterInvalidValue, &[("field", "extId")]);
        match error {
            Ok(error) => WebError::InputValidation(vec![error]).into(),
            Err(e) => e.into(),
        }
    })
}

// ==================== 控制器 ====================

#[derive(Default)]
pub struct BasicController;

impl Component for BasicController {
    fn construct(_: &Arguments) -> anyhow::Result<Self> {
        Ok(Self)
    }

    fn descriptor() -> ClassDescriptor {
        ClassDescriptor::new::<Self>().method("docs", vec![], |_: &Self, _| {
            Ok(ViewParameters::new("main", "docs", "docs").head_parameter("canonical", "/docs"))
        })
    }
}

impl Controller for BasicController {
    fn routes() -> Vec<ActionRoutes> {
        vec![ActionRoutes::new("docs", vec![Route::get("/docs")])]
    }
}

pub struct VenueController {
    venues: Arc<dyn VenueRepository>,
}

impl VenueController {
    fn venue_full(&self, reference: &str) -> anyhow::Result<ViewParameters> {
        let venue = self
            .venues
            .find_by_reference(reference)
            .ok_or(WebError::NotFound)?;

        Ok(ViewParameters::new("main", "venue", "venue")
            .head_parameter("canonical", format!("/venue/{}", venue.reference))
            .head_parameter("title", venue.name.clone())
            .body_parameter("venue", serde_json::to_value(&venue)?))
    }

    fn venue_minimal(&self, ext_id: u32) -> anyhow::Result<Body> {
        let venue = self.venues.find_by_ext_id(ext_id).ok_or(WebError::NotFound)?;
        Ok(Body::json(&json!({ "name": venue.name, "town": venue.town }), 200)?)
    }
}

impl Component for VenueController {
    fn dependencies() -> Vec<Parameter> {
        vec![Parameter::of::<dyn VenueRepository>("venues")]
    }

    fn construct(args: &Arguments) -> anyhow::Result<Self> {
        Ok(Self {
            venues: args.service::<dyn VenueRepository>("venues")?,
        })
    }

    fn descriptor() -> ClassDescriptor {
        ClassDescriptor::build::<Self, _>(Self::dependencies(), Self::construct)
            .method(
                "venueFull",
                vec![Parameter::string("venueReference")],
                |this: &Self, args| this.venue_full(&args.string("venueReference")?),
            )
            .method("venueMinimal", vec![Parameter::string("extId")], |this: &Self, args| {
                this.venue_minimal(ext_id(&args.string("extId")?)?)
            })
    }
}

impl Controller for VenueController {
    fn routes() -> Vec<ActionRoutes> {
        vec![
            ActionRoutes::new("venueMinimal", vec![Route::get("/api/v1/venue-short/:extId")]),
            ActionRoutes::new("venueFull", vec![Route::get("/venue/:venueReference")]),
        ]
    }
}

#[derive(Default)]
pub struct FavouriteController;

impl Component for FavouriteController {
    fn construct(_: &Arguments) -> anyhow::Result<Self> {
        Ok(Self)
    }

    fn descriptor() -> ClassDescriptor {
        let session = || Parameter::of::<Session>("session");
        let favourites = || Parameter::of::<FavouriteStore>("favourites");
        let venues = || Parameter::of::<dyn VenueRepository>("venues");

        ClassDescriptor::new::<Self>()
            .method("favsHtml", vec![session(), favourites(), venues()], |_: &Self, args| {
                args.get::<Session>("session")?.guard(true)?;
                let venues = favourite_venues(args)?;
                Ok(ViewParameters::new("main", "favs", "favs")
                    .head_parameter("canonical", "/favs")
                    .body_parameter("venues", serde_json::to_value(venues)?))
            })
            .method("favsJson", vec![session(), favourites(), venues()], |_: &Self, args| {
                args.get::<Session>("session")?.guard(false)?;
                let venues = favourite_venues(args)?;
                Ok(Body::json(&json!({ "items": venues }), 200)?)
            })
            .method(
                "favAdd",
                vec![Parameter::string("extId"), session(), favourites(), venues()],
                |_: &Self, args| {
                    args.get::<Session>("session")?.guard(false)?;
                    let ext_id = ext_id(&args.string("extId")?)?;
                    args.service::<dyn VenueRepository>("venues")?
                        .find_by_ext_id(ext_id)
                        .ok_or(WebError::NotFound)?;
                    let added = args.get::<FavouriteStore>("favourites")?.add(ext_id);
                    tracing::info!("Favourite {} added (new: {})", ext_id, added);
                    Ok(Body::empty())
                },
            )
            .method(
                "favDel",
                vec![Parameter::string("extId"), session(), favourites()],
                |_: &Self, args| {
                    args.get::<Session>("session")?.guard(false)?;
                    let ext_id = ext_id(&args.string("extId")?)?;
                    if !args.get::<FavouriteStore>("favourites")?.remove(ext_id) {
                        return Err(WebError::NotFound.into());
                    }
                    Ok(Body::empty())
                },
            )
    }
}

impl Controller for FavouriteController {
    fn routes() -> Vec<ActionRoutes> {
        vec![
            ActionRoutes::new("favsHtml", vec![Route::get("/favs")]),
            ActionRoutes::new("favsJson", vec![Route::get("/api/v1/search-favs")]),
            ActionRoutes::new("favAdd", vec![Route::post("/api/v1/favs/:extId")]),
            ActionRoutes::new("favDel", vec![Route::delete("/api/v1/favs/:extId")]),
        ]
    }
}

fn favourite_venues(args: &Arguments) -> anyhow::Result<Vec<crate::models::Venue>> {
    let venues = args.service::<dyn VenueRepository>("venues")?;
    Ok(args
        .get::<FavouriteStore>("favourites")?
        .all()
        .into_iter()
        .filter_map(|ext_id| venues.find_by_ext_id(ext_id))
        .collect())
}
