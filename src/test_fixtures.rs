//! HTML shaped like the residential search results page

pub struct CardFixture {
    pub title: &'static str,
    pub location: &'static str,
    pub unit: &'static str,
    pub room_type: &'static str,
    pub price: &'static str,
}

impl Default for CardFixture {
    fn default() -> Self {
        Self {
            title: "Muhaisnah Residence",
            location: "Muhaisnah Fourth",
            unit: "104",
            room_type: "1 Bedroom",
            price: " 50,000 /Year ",
        }
    }
}

pub fn card_html(card: &CardFixture) -> String {
    format!(
        r#"
        <section class="all-units-cards">
            <div class="card-img"><img src="/images/unit.jpg"></div>
            <h3>{title}</h3>
            <div class="card-details"><span>{location}</span></div>
            <div class="card-details"><span>Unit No. <i>{unit}</i></span></div>
            <div class="card-details"><span>Type: <i>{room_type}</i></span></div>
            <div class="card-details"><span>Size <i>750 sq.ft</i></span></div>
            <div class="card-details"><span>Parking <i>1</i></span></div>
            <div class="card-details"><span>Price <i>{price}</i></span></div>
        </section>
        "#,
        title = card.title,
        location = card.location,
        unit = card.unit,
        room_type = card.room_type,
        price = card.price,
    )
}

pub fn page_html(sections: &[String]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Residential Search</title></head>
<body>
    <div class="all-units-section cs_search_card search-content">
        {}
    </div>
</body>
</html>"#,
        sections.join("\n")
    )
}
