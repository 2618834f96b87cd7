use scraper::{ElementRef, Html, Selector};
use url::Url;

const CARD: &str = "div.Card_wrap__hES44.Card_listing__nGjbk.ListingRenderer_listingCard__DqY3k";
const CARD_LINK: &str = "a.CardText_link__C_fPZ.link_black";
const TITLE: &str = "h1.Product_title__42hYI";
const PRICE: &str = "div.PriceBlock_priceBlock__178uq";
const CHARACTERISTIC: &str =
    "div.CharacteristicsSection_content__5BpzM div.CharacteristicsItem_item__QnlK2";
const SLIDER_IMAGE: &str = "img.BigSlider_slide__image__2qjPm";

const THUMBNAIL_FRAGMENT: &str = "/160";
const FULL_SIZE_FRAGMENT: &str = "/716";

#[derive(Debug, Clone)]
pub struct ParsedProduct {
    pub title: String,
    pub price: String,
    pub characteristics: String,
    pub image_url: Option<String>,
}

fn selector(source: &str) -> Selector {
    Selector::parse(source).unwrap()
}

/// One entry per product card on the listing page; `None` marks a card
/// whose detail link is missing. An empty vec means the catalog has ended.
pub fn listing_links(html: &str) -> Vec<Option<String>> {
    let document = Html::parse_document(html);
    let card_selector = selector(CARD);
    let link_selector = selector(CARD_LINK);

    document
        .select(&card_selector)
        .map(|card| {
            card.select(&link_selector)
                .next()
                .and_then(|link| link.value().attr("href"))
                .filter(|href| !href.is_empty())
                .map(str::to_owned)
        })
        .collect()
}

pub fn product_details(html: &str, origin: &str) -> ParsedProduct {
    let document = Html::parse_document(html);

    let title = first_text(&document, TITLE);
    let price = first_text(&document, PRICE);

    let characteristics = document
        .select(&selector(CHARACTERISTIC))
        .filter_map(characteristic_line)
        .collect::<Vec<_>>()
        .join("\n");

    let image_url = document
        .select(&selector(SLIDER_IMAGE))
        .next()
        .and_then(|image| resolve_image_url(image, origin));

    ParsedProduct {
        title,
        price,
        characteristics,
        image_url,
    }
}

/// Last non-empty path segment of the detail-page URL, used as the stem of
/// the locally stored image filename.
pub fn image_stem(detail_url: &Url) -> Option<String> {
    detail_url
        .path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_owned)
}

fn first_text(document: &Html, source: &str) -> String {
    document
        .select(&selector(source))
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

// Name and value are the first two child elements of a characteristics item.
fn characteristic_line(item: ElementRef) -> Option<String> {
    let mut parts = item.children().filter_map(ElementRef::wrap);
    let name = clean_text(&parts.next()?.text().collect::<String>());
    let value = clean_text(&parts.next()?.text().collect::<String>());
    Some(format!("{name} - {value}"))
}

fn clean_text(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .replace("&nbsp;", " ")
        .replace("&nbsp", " ")
        .trim()
        .to_string()
}

fn resolve_image_url(image: ElementRef, origin: &str) -> Option<String> {
    let raw = image
        .value()
        .attr("data-src")
        .filter(|value| !value.is_empty())
        .or_else(|| image.value().attr("src"))?;

    // Inline placeholders mean the slider never loaded a network image.
    if raw.is_empty() || raw.starts_with("data:image") {
        return None;
    }

    Some(format!(
        "{}{}",
        origin,
        raw.replace(THUMBNAIL_FRAGMENT, FULL_SIZE_FRAGMENT)
    ))
}
