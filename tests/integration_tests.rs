use chrono::{NaiveDate, Timelike};
use pos_sales_analytics::export::{client_summary_table, duplicate_groups_table, write_bundle};
use pos_sales_analytics::filters::apply_in_sequence;
use pos_sales_analytics::*;
use rust_xlsxwriter::Workbook;

const LUNCH: &str = "Almuerzo Ejecutivo Aseavna";

/// 2025-03-10 (a Monday) as an Excel serial day count.
const MONDAY_SERIAL: f64 = 45726.0;

struct Sale {
    serial: f64,
    client: &'static str,
    group: &'static str,
    receipt: f64,
    product: &'static str,
    price: f64,
}

fn sale(
    serial: f64,
    client: &'static str,
    group: &'static str,
    receipt: f64,
    product: &'static str,
    price: f64,
) -> Sale {
    Sale {
        serial,
        client,
        group,
        receipt,
        product,
        price,
    }
}

fn sample_sales() -> Vec<Sale> {
    vec![
        sale(MONDAY_SERIAL + 0.5, "Ana", "Planta", 1001.0, LUNCH, 2500.0),
        sale(MONDAY_SERIAL + 0.75, "Ana", "Planta", 1002.0, LUNCH, 2500.0),
        sale(MONDAY_SERIAL + 0.5, "Luis", "Oficinas", 1003.0, LUNCH, 2500.0),
        sale(MONDAY_SERIAL + 1.4, "Luis", "Oficinas", 1004.0, "Café", 800.0),
        sale(MONDAY_SERIAL + 1.4, "Luis", "Oficinas", 1004.0, "Café", 800.0),
        sale(MONDAY_SERIAL + 2.5, "Marta", "Planta", 1005.0, "Empanada", 1200.0),
        sale(MONDAY_SERIAL + 3.5, "Sofía", "Oficinas", 1006.0, "Banquete", 30000.0),
    ]
}

/// Workbook shaped like a POS export. Headers carry stray case and spaces,
/// and the cost center column is absent.
fn orders_workbook(sales: &[Sale]) -> Vec<u8> {
    let headers = [
        " fecha ",
        "CLIENTE/NOMBRE",
        "Cliente/Nombre principal",
        "Número de recibo",
        "Líneas de la orden",
        "Precio total colaborador",
        "Comision Aseavna",
        "Cuentas por a cobrar aseavna",
        "Cuentas por a Cobrar Avna",
    ];

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (idx, s) in sales.iter().enumerate() {
        let row = (idx + 1) as u32;
        sheet.write_number(row, 0, s.serial).unwrap();
        sheet.write_string(row, 1, s.client).unwrap();
        sheet.write_string(row, 2, s.group).unwrap();
        sheet.write_number(row, 3, s.receipt).unwrap();
        sheet.write_string(row, 4, s.product).unwrap();
        sheet.write_number(row, 5, s.price).unwrap();
        sheet.write_number(row, 6, s.price * 0.1).unwrap();
        sheet.write_number(row, 7, s.price * 0.75).unwrap();
        sheet.write_number(row, 8, s.price * 0.25).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn load_sample() -> (SalesPipeline, SalesDataset) {
    let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
    let dataset = pipeline
        .load_bytes(&orders_workbook(&sample_sales()))
        .unwrap();
    (pipeline, dataset)
}

#[test]
fn test_workbook_loads_into_normalized_lines() {
    let (_, dataset) = load_sample();
    let report = &dataset.report;

    assert_eq!(report.rows_read, 7);
    assert_eq!(report.duplicate_rows_removed, 1);
    assert_eq!(report.invalid_dates, 0);
    assert!(report.serial_dates);
    assert_eq!(
        report.missing_columns,
        vec![
            "Cliente/Código de barras",
            "Centro de Costos Aseavna",
            "Líneas de la orden/Cantidad"
        ]
    );
    assert_eq!(dataset.len(), 6);

    let first = &dataset.lines[0];
    assert_eq!(first.day(), Some(ymd(2025, 3, 10)));
    assert_eq!(first.date.unwrap().hour(), 12);
    assert_eq!(first.weekday.as_deref(), Some("Lunes"));
    assert_eq!(first.receipt, "1001");
    assert_eq!(first.total, 2500.0);
    assert_eq!(first.client_barcode, "Desconocido");
    assert_eq!(first.cost_center, "0");
    assert_eq!(first.quantity, 0.0);
}

#[test]
fn test_no_configured_column_is_null_after_normalization() {
    let (_, dataset) = load_sample();
    for line in &dataset.lines {
        for text in [
            &line.client_barcode,
            &line.client,
            &line.client_group,
            &line.cost_center,
            &line.receipt,
            &line.product,
        ] {
            assert!(!text.is_empty());
        }
        assert!(line.date.is_some());
        assert!(line.weekday.is_some());
        assert!(line.total.is_finite());
    }
}

#[test]
fn test_full_analysis_of_workbook() {
    let (pipeline, dataset) = load_sample();
    let analysis = pipeline.analyze(&dataset, &FilterSet::new());

    assert_eq!(analysis.duplicates.groups.len(), 1);
    assert_eq!(analysis.duplicates.groups[0].client, "Ana");
    assert_eq!(analysis.duplicates.groups[0].count, 2);
    assert_eq!(analysis.duplicates.rows.len(), 2);

    let view_total: f64 = analysis.view.iter().map(|l| l.total).sum();
    assert!((analysis.clients.total_sales() - view_total).abs() < 1e-6);
    assert_eq!(analysis.metrics.orders, 6);
    assert_eq!(analysis.metrics.most_sold.as_deref(), Some("Banquete"));

    // mean client total = 39500 / 4, doubled = 19750
    assert_eq!(analysis.clients.unusual.len(), 1);
    assert_eq!(analysis.clients.unusual[0].client, "Sofía");

    let forecast = analysis.forecast.forecast().unwrap();
    assert_eq!(forecast.history.len(), 4);
    assert_eq!(forecast.points.len(), 7);
    assert_eq!(forecast.points[0].date, ymd(2025, 3, 14));
    assert_eq!(analysis.growth, GrowthOutcome::InsufficientData);
}

#[test]
fn test_filters_commute_on_loaded_data() {
    let (_, dataset) = load_sample();
    let by_group = Filter::ClientGroup {
        value: "Oficinas".to_string(),
    };
    let by_amount = Filter::AmountRange {
        min: 0.0,
        max: 5000.0,
    };
    let by_day = Filter::DateRange {
        start: ymd(2025, 3, 10),
        end: ymd(2025, 3, 11),
    };

    let forward = apply_in_sequence(
        &dataset.lines,
        &[by_group.clone(), by_amount.clone(), by_day.clone()],
    );
    let backward = apply_in_sequence(&dataset.lines, &[by_day, by_amount, by_group]);

    assert_eq!(forward, backward);
    assert_eq!(forward.len(), 2);
}

#[test]
fn test_filtered_analysis_narrows_every_figure() {
    let (pipeline, dataset) = load_sample();
    let filters = FilterSet::new()
        .with_date_range(ymd(2025, 3, 10), ymd(2025, 3, 10))
        .with_product_contains("ALMUERZO");
    let analysis = pipeline.analyze(&dataset, &filters);

    assert_eq!(analysis.view.len(), 3);
    assert_eq!(analysis.metrics.total_sales, 7500.0);
    assert_eq!(analysis.forecast, ForecastOutcome::InsufficientData);
    assert_eq!(analysis.duplicates.groups.len(), 1);
}

#[test]
fn test_receivables_total_variant() {
    let pipeline = SalesPipeline::new(PipelineConfig::receivables_total()).unwrap();
    let dataset = pipeline
        .load_bytes(&orders_workbook(&sample_sales()))
        .unwrap();

    assert_eq!(pipeline.config().total_label, "Total Final");
    for line in &dataset.lines {
        let expected = line.receivable_aseavna + line.receivable_avna;
        assert!((line.total - expected).abs() < 1e-9);
    }
}

#[test]
fn test_missing_required_column_fails_and_lenient_loader_recovers() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Cliente/Nombre").unwrap();
    sheet.write_string(1, 0, "Ana").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
    match pipeline.load_bytes(&bytes) {
        Err(AnalyticsError::DataValidation { missing }) => {
            assert_eq!(missing, vec!["Fecha".to_string()])
        }
        other => panic!("expected a validation error, got {:?}", other),
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Orders_pos.xlsx");
    std::fs::write(&path, &bytes).unwrap();

    let dataset = pipeline.load_path_or_empty(&path);
    assert!(dataset.is_empty());
    assert!(dataset
        .report
        .error
        .as_deref()
        .unwrap()
        .contains("Missing required columns"));
}

#[test]
fn test_load_path_reads_workbook_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Orders_pos.xlsx");
    std::fs::write(&path, orders_workbook(&sample_sales())).unwrap();

    let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
    let from_disk = pipeline.load_path(&path).unwrap();
    let (_, from_bytes) = load_sample();

    assert_eq!(from_disk.lines, from_bytes.lines);
    assert_eq!(from_disk.fingerprint(), from_bytes.fingerprint());
}

#[test]
fn test_csv_input_with_text_dates() {
    let csv = "\
Fecha,Cliente/Nombre,Número de recibo,Líneas de la orden,Precio total colaborador
2025-01-15 12:00:00,Ana,R-1,Café,100
2025-02-15 12:00:00,Ana,R-2,Café,150
2025-02-16 09:30:00,Luis,R-3,Té,80
not a date,Luis,R-4,Té,80
";
    let pipeline = SalesPipeline::new(PipelineConfig::default()).unwrap();
    let dataset = pipeline.load_csv(csv.as_bytes()).unwrap();

    assert!(!dataset.report.serial_dates);
    assert_eq!(dataset.report.invalid_dates, 1);
    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.lines[0].weekday.as_deref(), Some("Miércoles"));

    let analysis = pipeline.analyze(&dataset, &FilterSet::new());
    let top = analysis.growth.top_growth(5);
    assert_eq!(top[0].product, "Café");
    assert!((top[0].growth_pct - 50.0).abs() < 1e-9);
    assert_eq!(top[1].growth_pct, 0.0);

    // the undated line stays in the view but not in the date range
    let ranged = FilterSet::new().with_date_range(ymd(2025, 1, 1), ymd(2025, 12, 31));
    assert_eq!(pipeline.analyze(&dataset, &ranged).view.len(), 3);
}

#[test]
fn test_client_summary_export_round_trip() {
    let (pipeline, dataset) = load_sample();
    let analysis = pipeline.analyze(&dataset, &FilterSet::new());
    let table = client_summary_table(&analysis.clients, &pipeline.config().labels);

    let bytes = table.to_csv().unwrap();
    let parsed = ReportTable::from_csv(&table.title, &table.kinds, bytes.as_slice()).unwrap();

    assert_eq!(parsed.columns, table.columns);
    assert_eq!(parsed.rows.len(), analysis.clients.summaries.len());
    for (parsed_row, summary) in parsed.rows.iter().zip(&analysis.clients.summaries) {
        assert_eq!(parsed_row[0], ReportCell::Text(summary.client.clone()));
        assert!((parsed_row[1].as_number().unwrap() - summary.total_sales).abs() < 0.01);
        assert_eq!(parsed_row[2].as_number(), Some(summary.orders as f64));
        assert_eq!(parsed_row[6], ReportCell::Text(summary.top_product.clone()));
    }
}

#[test]
fn test_exported_workbook_reads_back_through_loader() {
    let (pipeline, dataset) = load_sample();
    let analysis = pipeline.analyze(&dataset, &FilterSet::new());
    let table = duplicate_groups_table(&analysis.duplicates, &pipeline.config().labels);

    let bytes = table.to_xlsx(&table.title).unwrap();
    let raw = RawTable::from_spreadsheet_bytes(&bytes).unwrap();

    assert_eq!(raw.headers, vec!["Cliente", "Fecha_Dia", "Cantidad"]);
    assert_eq!(raw.len(), 1);
    assert_eq!(raw.cell(0, 0), &CellValue::Text("Ana".to_string()));
    assert_eq!(raw.cell(0, 2).as_number(), Some(2.0));
}

#[test]
fn test_scheduled_bundle_lands_in_new_directory() {
    let (pipeline, dataset) = load_sample();
    let analysis = pipeline.analyze(&dataset, &FilterSet::new());
    let table = client_summary_table(&analysis.clients, &pipeline.config().labels);

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("app").join("reports");
    let now = ymd(2025, 3, 14).and_hms_opt(23, 59, 1).unwrap();
    let written = write_bundle(&target, "resumen_ventas", &table, now).unwrap();

    assert!(written.len() >= 2);
    let csv = std::fs::read(target.join("resumen_ventas_20250314_235901.csv")).unwrap();
    assert_eq!(csv, table.to_csv().unwrap());
}

#[test]
fn test_cache_invalidates_after_reload() {
    let (pipeline, dataset) = load_sample();
    let mut cache = AnalysisCache::new();
    let filters = FilterSet::new();

    let first_total = pipeline
        .analyze_cached(&mut cache, &dataset, &filters)
        .metrics
        .total_sales;
    pipeline.analyze_cached(&mut cache, &dataset, &filters);
    assert_eq!(cache.hits(), 1);

    let mut sales = sample_sales();
    sales.push(sale(MONDAY_SERIAL + 4.5, "Ana", "Planta", 1007.0, "Café", 800.0));
    let reloaded = pipeline.load_bytes(&orders_workbook(&sales)).unwrap();
    assert_ne!(reloaded.fingerprint(), dataset.fingerprint());

    let second_total = pipeline
        .analyze_cached(&mut cache, &reloaded, &filters)
        .metrics
        .total_sales;
    assert_eq!(second_total - first_total, 800.0);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.misses(), 2);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    let config = PipelineConfig {
        unusual_policy: UnusualPolicy::Percentile { percentile: 95.0 },
        excel_correction_days: 2,
        ..PipelineConfig::receivables_total()
    };
    std::fs::write(&path, config.to_json().unwrap()).unwrap();

    let loaded = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded, config);

    let pipeline = SalesPipeline::new(loaded).unwrap();
    let dataset = pipeline
        .load_bytes(&orders_workbook(&sample_sales()))
        .unwrap();
    assert_eq!(dataset.lines[0].day(), Some(ymd(2025, 3, 8)));
}
