//! The KUDiR report (income and spending ledger).
//!
//! The quarterly breakdown itself comes from a stored procedure in the
//! document store; this module shapes those rows into the statutory
//! structure and renders it as markup or as a merged PDF. Row order inside a
//! quarter is taken as delivered (chronological); the quarter total is
//! quarter-scoped while the running total is cumulative from the start of
//! the year.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::ports::{StoreError, StorePort};
use crate::domain::record::Rid;
use crate::domain::schema::EntityKind;

use super::workdir::ReportWorkdir;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("report file handling failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("{name} exited with status {code:?}")]
    Tool { name: String, code: Option<i32> },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KudirHeader {
    pub company_name: String,
    pub inn: String,
    pub kpp: String,
    pub address: String,
    pub period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KudirRow {
    pub number: i64,
    pub date: i64,
    pub description: String,
    pub amount: Decimal,
    /// Spending category code; zero for income rows.
    pub category: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KudirQuarter {
    pub rows: Vec<KudirRow>,
    /// Sum of this quarter's rows only.
    pub quarter_amount: Decimal,
    /// Cumulative sum from the first quarter through this one.
    pub total_amount: Decimal,
    /// Sub-totals per category code ≥ 3 (insurance columns); empty for the
    /// income section.
    pub category_amounts: BTreeMap<i64, Decimal>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KudirData {
    pub header: KudirHeader,
    /// Keyed "1".."4".
    pub incomes: BTreeMap<String, KudirQuarter>,
    pub spendings: BTreeMap<String, KudirQuarter>,
}

impl KudirData {
    /// True when nothing could be fetched: blank request arguments or a
    /// company invisible to the caller. Fetched data always carries its
    /// period in the header.
    pub fn is_blank(&self) -> bool {
        self.header.period.trim().is_empty()
    }
}

/// The first spending category that gets its own report column.
const FIRST_COLUMN_CATEGORY: i64 = 3;

fn flexible_i64(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn flexible_decimal(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).unwrap_or_default(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

fn parse_row(row: &Value) -> Option<(String, i64, KudirRow)> {
    let section = row.get("section")?.as_str()?.to_owned();
    let quarter = flexible_i64(row.get("quarter"));
    if !(1..=4).contains(&quarter) {
        return None;
    }
    Some((
        section,
        quarter,
        KudirRow {
            number: flexible_i64(row.get("number")),
            date: flexible_i64(row.get("date")),
            description: row
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            amount: flexible_decimal(row.get("amount")),
            category: flexible_i64(row.get("type")),
        },
    ))
}

fn empty_quarters() -> BTreeMap<String, KudirQuarter> {
    (1..=4)
        .map(|quarter| (quarter.to_string(), KudirQuarter::default()))
        .collect()
}

fn finalize(quarters: &mut BTreeMap<String, KudirQuarter>, with_categories: bool) {
    let mut running = Decimal::ZERO;
    for quarter in 1..=4 {
        let Some(entry) = quarters.get_mut(&quarter.to_string()) else {
            continue;
        };
        entry.quarter_amount = entry.rows.iter().map(|row| row.amount).sum();
        running += entry.quarter_amount;
        entry.total_amount = running;
        if with_categories {
            for row in &entry.rows {
                if row.category >= FIRST_COLUMN_CATEGORY {
                    *entry
                        .category_amounts
                        .entry(row.category)
                        .or_insert(Decimal::ZERO) += row.amount;
                }
            }
        }
    }
}

/// Shape the stored procedure's rows into the statutory structure.
pub fn aggregate(header: KudirHeader, rows: &[Value]) -> KudirData {
    let mut incomes = empty_quarters();
    let mut spendings = empty_quarters();
    for row in rows {
        let Some((section, quarter, parsed)) = parse_row(row) else {
            continue;
        };
        let target = match section.as_str() {
            "income" => &mut incomes,
            "spending" => &mut spendings,
            _ => continue,
        };
        if let Some(entry) = target.get_mut(&quarter.to_string()) {
            entry.rows.push(parsed);
        }
    }
    finalize(&mut incomes, false);
    finalize(&mut spendings, true);
    KudirData {
        header,
        incomes,
        spendings,
    }
}

/// Fetch and shape the report data for one company and period.
///
/// A blank company id or period yields the empty structure; that is a
/// guard, not a validation error.
#[instrument(skip(store, owner))]
pub async fn get_data(
    store: &dyn StorePort,
    owner: Option<&Rid>,
    company_id: &str,
    period: &str,
) -> Result<KudirData, ReportError> {
    if company_id.trim().is_empty() || period.trim().is_empty() {
        return Ok(KudirData::default());
    }
    let Some(rid) = Rid::parse(company_id) else {
        return Ok(KudirData::default());
    };
    let Some(company) = store.get(EntityKind::Company, &rid, owner).await? else {
        return Ok(KudirData::default());
    };
    let header = KudirHeader {
        company_name: company.text("name").unwrap_or_default(),
        inn: company.text("inn").unwrap_or_default(),
        kpp: company.text("kpp").unwrap_or_default(),
        address: company.text("address").unwrap_or_default(),
        period: period.to_owned(),
    };
    let rows = store
        .call_function(&format!(
            "/getReportData_kudir/{}/{}",
            rid.external(),
            period
        ))
        .await?;
    debug!(rows = rows.len(), "kudir rows fetched");
    Ok(aggregate(header, &rows))
}

/// Quarter footer labels: every quarter prints its own total; quarters 2-4
/// additionally print the cumulative label.
pub fn footer_labels(quarter: i64) -> (&'static str, Option<&'static str>) {
    match quarter {
        2 => ("Итого за II квартал", Some("Итого за полугодие")),
        3 => ("Итого за III квартал", Some("Итого за 9 месяцев")),
        4 => ("Итого за IV квартал", Some("Итого за год")),
        _ => ("Итого за I квартал", None),
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|date| date.format("%d.%m.%Y").to_string())
        .unwrap_or_default()
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>\
         table{{border-collapse:collapse;width:100%}}\
         td,th{{border:1px solid #000;padding:4px;font-size:12px}}\
         h1,h2{{font-family:sans-serif}}</style></head><body>{body}</body></html>"
    )
}

/// Title page with the company requisites.
pub fn render_header(data: &KudirData) -> String {
    let header = &data.header;
    page(&format!(
        "<h1>Книга учета доходов и расходов</h1>\
         <h2>за {period} год</h2>\
         <p>Налогоплательщик: {name}</p>\
         <p>ИНН: {inn}{kpp}</p>\
         <p>Адрес: {address}</p>",
        period = escape(&header.period),
        name = escape(&header.company_name),
        inn = escape(&header.inn),
        kpp = if header.kpp.is_empty() {
            String::new()
        } else {
            format!(", КПП: {}", escape(&header.kpp))
        },
        address = escape(&header.address),
    ))
}

fn render_section(
    title: &str,
    quarters: &BTreeMap<String, KudirQuarter>,
    with_categories: bool,
) -> String {
    let mut body = format!("<h2>{}</h2>", escape(title));
    for quarter in 1..=4 {
        let Some(entry) = quarters.get(&quarter.to_string()) else {
            continue;
        };
        body.push_str("<table><tr><th>№</th><th>Дата</th><th>Содержание операции</th><th>Сумма</th>");
        if with_categories {
            body.push_str("<th>Вид расхода</th>");
        }
        body.push_str("</tr>");
        for row in &entry.rows {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
                row.number,
                format_date(row.date),
                escape(&row.description),
                row.amount,
            ));
            if with_categories {
                body.push_str(&format!("<td>{}</td>", row.category));
            }
            body.push_str("</tr>");
        }
        let (quarter_label, total_label) = footer_labels(quarter);
        let span = if with_categories { 4 } else { 3 };
        body.push_str(&format!(
            "<tr><td colspan=\"{span}\">{quarter_label}</td><td>{}</td></tr>",
            entry.quarter_amount,
        ));
        if let Some(total_label) = total_label {
            body.push_str(&format!(
                "<tr><td colspan=\"{span}\">{total_label}</td><td>{}</td></tr>",
                entry.total_amount,
            ));
        }
        if with_categories && !entry.category_amounts.is_empty() {
            for (category, amount) in &entry.category_amounts {
                body.push_str(&format!(
                    "<tr><td colspan=\"{span}\">Вид расхода {category}</td><td>{amount}</td></tr>"
                ));
            }
        }
        body.push_str("</table><br/>");
    }
    body
}

pub fn render_incomes(data: &KudirData) -> String {
    page(&render_section("I. Доходы", &data.incomes, false))
}

pub fn render_spendings(data: &KudirData) -> String {
    page(&render_section("II. Расходы", &data.spendings, true))
}

/// Inline markup form; no filesystem side effects. Blank data renders an
/// error heading instead of an empty statutory form.
pub fn generate_html(data: &KudirData) -> String {
    if data.is_blank() {
        return page("<h1 style='color:red'>Ошибка данных</h1>");
    }
    let mut combined = render_header(data);
    combined.push_str(&render_incomes(data));
    combined.push_str(&render_spendings(data));
    combined
}

/// Renderer invocation for one section; the wide spending table is laid out
/// landscape.
fn renderer_args<'a>(section: &str, html: &'a Path, pdf: &'a Path) -> Vec<&'a OsStr> {
    let mut args: Vec<&OsStr> = Vec::new();
    if section == "spendings" {
        args.push(OsStr::new("-O"));
        args.push(OsStr::new("landscape"));
    }
    args.push(html.as_os_str());
    args.push(pdf.as_os_str());
    args
}

async fn run_tool(name: &str, args: &[&OsStr]) -> Result<(), ReportError> {
    let status = Command::new(name)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if !status.success() {
        return Err(ReportError::Tool {
            name: name.to_owned(),
            code: status.code(),
        });
    }
    Ok(())
}

/// Render the three sections to PDF and merge them. Intermediate files live
/// in `workdir`; the caller owns its cleanup.
#[instrument(skip(data, workdir))]
pub async fn generate_pdf(data: &KudirData, workdir: &ReportWorkdir) -> Result<Vec<u8>, ReportError> {
    let sections = [
        ("header", render_header(data)),
        ("incomes", render_incomes(data)),
        ("spendings", render_spendings(data)),
    ];
    let mut parts = Vec::new();
    for (name, markup) in &sections {
        let html = workdir.file(&format!("{name}.html"));
        let pdf = workdir.file(&format!("{name}.pdf"));
        tokio::fs::write(&html, markup).await?;
        run_tool("wkhtmltopdf", &renderer_args(name, &html, &pdf)).await?;
        parts.push(pdf);
    }
    let merged = workdir.file("report.pdf");
    let mut args: Vec<&OsStr> = parts.iter().map(|part| part.as_os_str()).collect();
    args.push(merged.as_os_str());
    run_tool("pdfunite", &args).await?;
    Ok(tokio::fs::read(&merged).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn income_row(quarter: i64, number: i64, amount: &str) -> Value {
        json!({
            "section": "income", "quarter": quarter, "number": number,
            "date": 1_600_000_000 + number, "description": format!("Операция {number}"),
            "amount": amount,
        })
    }

    #[test]
    fn quarter_amounts_are_quarter_scoped_and_totals_cumulative() {
        let rows = vec![
            income_row(1, 1, "100"),
            income_row(2, 2, "200"),
            income_row(3, 3, "300"),
            income_row(4, 4, "400"),
            income_row(4, 5, "50"),
        ];
        let data = aggregate(KudirHeader::default(), &rows);
        let q = |n: i64| &data.incomes[&n.to_string()];
        assert_eq!(q(1).quarter_amount, Decimal::from(100));
        assert_eq!(q(2).quarter_amount, Decimal::from(200));
        assert_eq!(q(4).quarter_amount, Decimal::from(450));
        let totals: Vec<Decimal> = (1..=4).map(|n| q(n).total_amount).collect();
        assert!(totals.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(q(4).total_amount, Decimal::from(1050));
    }

    #[test]
    fn only_insurance_categories_get_subtotals() {
        let rows = vec![
            json!({"section": "spending", "quarter": 1, "number": 1, "date": 1,
                   "description": "Налог", "amount": "10", "type": 1}),
            json!({"section": "spending", "quarter": 1, "number": 2, "date": 2,
                   "description": "Взносы ОПС", "amount": "20", "type": 3}),
            json!({"section": "spending", "quarter": 1, "number": 3, "date": 3,
                   "description": "Взносы ОМС", "amount": "30", "type": 5}),
        ];
        let data = aggregate(KudirHeader::default(), &rows);
        let quarter = &data.spendings["1"];
        assert_eq!(quarter.quarter_amount, Decimal::from(60));
        assert_eq!(quarter.category_amounts.len(), 2);
        assert_eq!(quarter.category_amounts[&3], Decimal::from(20));
        assert!(!quarter.category_amounts.contains_key(&1));
    }

    #[rstest]
    #[case(1, "Итого за I квартал", None)]
    #[case(2, "Итого за II квартал", Some("Итого за полугодие"))]
    #[case(3, "Итого за III квартал", Some("Итого за 9 месяцев"))]
    #[case(4, "Итого за IV квартал", Some("Итого за год"))]
    fn footer_labels_match_the_statutory_form(
        #[case] quarter: i64,
        #[case] label: &str,
        #[case] cumulative: Option<&str>,
    ) {
        assert_eq!(footer_labels(quarter), (label, cumulative));
    }

    #[test]
    fn markup_escapes_row_content() {
        let rows = vec![json!({
            "section": "income", "quarter": 1, "number": 1, "date": 1,
            "description": "<b>Оплата</b> & аванс", "amount": "1",
        })];
        let data = aggregate(KudirHeader::default(), &rows);
        let markup = render_incomes(&data);
        assert!(markup.contains("&lt;b&gt;Оплата&lt;/b&gt; &amp; аванс"));
        assert!(!markup.contains("<b>Оплата</b>"));
    }

    #[test]
    fn blank_data_renders_an_error_heading() {
        let markup = generate_html(&KudirData::default());
        assert!(markup.contains("color:red"));
        assert!(markup.contains("Ошибка данных"));

        let header = KudirHeader {
            period: "2021".to_owned(),
            ..KudirHeader::default()
        };
        let markup = generate_html(&aggregate(header, &[income_row(1, 1, "100")]));
        assert!(!markup.contains("color:red"));
        assert!(markup.contains("Книга учета доходов и расходов"));
    }

    #[test]
    fn spending_section_is_rendered_landscape() {
        let html = std::path::PathBuf::from("spendings.html");
        let pdf = std::path::PathBuf::from("spendings.pdf");
        let args = renderer_args("spendings", &html, &pdf);
        assert_eq!(args[..2], [OsStr::new("-O"), OsStr::new("landscape")]);
        assert_eq!(renderer_args("incomes", &html, &pdf).len(), 2);
    }

    #[test]
    fn unknown_sections_and_quarters_are_ignored() {
        let rows = vec![
            json!({"section": "bonus", "quarter": 1, "amount": "1"}),
            json!({"section": "income", "quarter": 7, "amount": "1"}),
        ];
        let data = aggregate(KudirHeader::default(), &rows);
        assert!(data.incomes.values().all(|quarter| quarter.rows.is_empty()));
    }
}
