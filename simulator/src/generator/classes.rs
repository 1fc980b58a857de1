/// Pest classes the device's detector can emit.
pub const CLASS_NAMES: &[&str] = &[
    "Rice Leaf Roller",
    "Black Cutworm",
    "Beet Armyworm",
    "Rice Stem Borer",
    "Corn Earworm",
    "Fall Armyworm",
    "Locust",
    "Cotton Bollworm",
    "Whitefly",
    "Thrips",
    "Green Leafhopper",
    "Flea Beetle",
    "Grasshopper",
    "Mealybug",
    "Spider Mite",
    "Aphid",
    "Wireworm",
    "Fruit Fly",
    "Diamondback Moth",
    "Corn Rootworm",
];

/// Color every box is drawn with on the device.
pub const DETECTION_COLOR: &str = "#00FF00";

/// One-line control advice shown next to the live feed.
pub fn advisory_for(label: &str) -> String {
    let advice = match label {
        "Aphid" => "Release ladybugs or spray insecticidal soap on leaf undersides.",
        "Whitefly" => "Hang yellow sticky traps and apply neem oil weekly.",
        "Fall Armyworm" => "Scout whorls early and apply Bt while larvae are small.",
        "Locust" => "Report swarms and apply targeted barrier treatments.",
        "Thrips" => "Use blue sticky traps and remove weedy hosts.",
        "Spider Mite" => "Increase humidity and release predatory mites.",
        _ => "Isolate affected plants and monitor population growth.",
    };
    format!("{label}: {advice}")
}
