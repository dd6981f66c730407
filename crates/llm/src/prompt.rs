//! Prompt text for the parcel analysis request.

use std::fmt::Write as _;

use pipeline::{format_krw, LandParcel};

/// System prompt sent with every analysis request.
pub const SYSTEM_PROMPT: &str = "You are a land-use analyst specialising in Korean \
cadastral, zoning and official land price data. Write a precise, professional \
analysis for an investor audience. Use Markdown with short headed sections and \
do not invent figures that are not in the parcel data.";

/// Builds the user message asking for the seven-part parcel analysis.
pub fn analysis_prompt(parcel: &LandParcel) -> String {
    let mut prompt = String::from("Analyse the following land parcel in detail.\n\n");

    let fields = [
        ("Address", parcel.address.as_str()),
        ("Land category", parcel.land_category.as_str()),
        ("Zoning", parcel.zoning.as_str()),
        ("Zoning district", parcel.zoning_district.as_str()),
        ("Land use", parcel.land_use.as_str()),
        ("Terrain", parcel.terrain.as_str()),
        ("Shape", parcel.shape.as_str()),
        ("Road frontage", parcel.road_frontage.as_str()),
    ];
    for (label, value) in fields {
        let _ = writeln!(prompt, "- {label}: {value}");
    }
    let _ = writeln!(
        prompt,
        "- Official unit price: {} per square metre",
        format_krw(parcel.unit_price)
    );
    let scores = &parcel.scores;
    let _ = writeln!(
        prompt,
        "- Scores (0-100): location {}, infrastructure {}, stability {}",
        scores.location, scores.infrastructure, scores.stability
    );

    prompt.push_str(
        "\nCover each of these points:\n\
         1. What the land category and zoning mean for this parcel\n\
         2. Current land use\n\
         3. Strengths and weaknesses of the terrain and lot shape\n\
         4. Road frontage and access\n\
         5. Level of the official land price\n\
         6. Development potential and regulatory constraints\n\
         7. Investment value\n",
    );
    prompt
}
