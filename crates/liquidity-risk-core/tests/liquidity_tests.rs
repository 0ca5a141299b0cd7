use liquidity_risk_core::liquidity::anomaly::AnomalySignal;
use liquidity_risk_core::liquidity::flags::{self, FlagThresholds};
use liquidity_risk_core::liquidity::ratios::{self, CfoPatPolicy};
use liquidity_risk_core::liquidity::schema;
use liquidity_risk_core::liquidity::scoring::{self, BucketBoundary, RiskBucket, WeightScenario};
use liquidity_risk_core::liquidity::table_io::{self, TableFormat, DERIVED_COLUMNS};
use liquidity_risk_core::liquidity::{run_risk_pipeline, PipelineConfig, RecordTable};
use liquidity_risk_core::RiskError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Cursor;
use std::path::Path;

// ===========================================================================
// Fixtures
// ===========================================================================

const PORTFOLIO_CSV: &str = "\
Company,Year,TotalCurrentAssets,TotalCurrentLiabilities,Cash,Receivables,TradePayables,ShortTermBorrowings,CFO,Sales,NetProfit,Sector
Alpha,2022,500,300,120,150,180,60,90,1200,80,Industrials
Alpha,2023,520,310,110,160,185,65,85,1250,82,Industrials
Beta,2022,450,280,100,140,170,55,75,1100,70,Retail
Beta,2023,470,290,105,145,175,58,78,1150,72,Retail
Gamma,2022,480,300,115,150,178,62,88,1180,79,Energy
Gamma,2023,490,305,112,155,180,60,84,1210,80,Energy
Delta,2022,900,400,20,600,500,300,5,900,120,Trading
Delta,2023,950,0,15,700,520,310,-40,800,-10,Trading
";

fn portfolio() -> RecordTable {
    table_io::read_table(PORTFOLIO_CSV.as_bytes()).unwrap()
}

fn cell(table: &RecordTable, row: usize, column: &str) -> String {
    let idx = table.column_index(column).unwrap();
    table.cell(row, idx).to_string()
}

// ===========================================================================
// Ratios and flags
// ===========================================================================

#[test]
fn test_delta_2022_raises_every_flag() {
    let out = run_risk_pipeline(&portfolio(), &PipelineConfig::default()).unwrap();
    let delta = &out.result.records[6];

    assert_eq!(delta.record.company, "Delta");
    assert_eq!(delta.ratios.cr, Some(dec!(2.25)));
    // TACR = (20 + 600) / (500 + 300) = 0.775
    assert_eq!(delta.ratios.tacr, Some(dec!(0.775)));
    assert_eq!(delta.flags.high_dso, 1);
    assert_eq!(delta.flags.tacr_mismatch, 1);
    assert_eq!(delta.flags.low_cash_profit, 1);
    assert_eq!(delta.flags.flag_count, 3);
    assert_eq!(delta.scores.flag_score, dec!(99));
}

#[test]
fn test_zero_liabilities_and_loss_year() {
    let out = run_risk_pipeline(&portfolio(), &PipelineConfig::default()).unwrap();
    let delta = &out.result.records[7];

    assert_eq!(delta.ratios.cr, None);
    assert_eq!(delta.flags.tacr_mismatch, 0);
    assert_eq!(delta.ratios.cfo_to_pat, None);
    assert_eq!(delta.flags.low_cash_profit, 0);
    assert_eq!(delta.flags.high_dso, 1);
    assert_eq!(delta.flags.flag_count, 1);
}

#[test]
fn test_dso_at_threshold_does_not_flag() {
    let csv = "\
Company,Year,TotalCurrentAssets,TotalCurrentLiabilities,Cash,Receivables,TradePayables,ShortTermBorrowings,CFO,Sales,NetProfit
A,2022,200,100,50,120,100,50,10,365,50
B,2022,200,100,50,480,100,50,10,1460,50
C,2022,200,100,50,121,100,50,10,365,50
";
    let table = table_io::read_table(csv.as_bytes()).unwrap();
    let records = schema::parse_records(&table).unwrap();
    let thresholds = FlagThresholds::default();

    let high_dso: Vec<u8> = records
        .iter()
        .map(|rec| {
            let r = ratios::compute_ratios(rec, CfoPatPolicy::default());
            flags::evaluate_flags(&r, &thresholds).high_dso
        })
        .collect();
    assert_eq!(high_dso, vec![0, 0, 1]);

    let out = run_risk_pipeline(&table, &PipelineConfig::default()).unwrap();
    assert_eq!(out.result.records[0].ratios.dso, Some(dec!(120)));
    assert_eq!(out.result.records[0].flags.high_dso, 0);
    assert_eq!(out.result.records[1].flags.high_dso, 0);
    // Only the low cash-to-profit flag (CFO / PAT = 0.2) remains
    assert_eq!(out.result.records[0].scores.flag_score, dec!(33));
}

#[test]
fn test_flag_count_is_sum_of_flags() {
    let out = run_risk_pipeline(&portfolio(), &PipelineConfig::default()).unwrap();
    for r in &out.result.records {
        let f = &r.flags;
        assert_eq!(f.flag_count, f.high_dso + f.tacr_mismatch + f.low_cash_profit);
        assert!(f.flag_count <= 3);
    }
}

// ===========================================================================
// Scores
// ===========================================================================

#[test]
fn test_composite_matches_every_weight_scenario() {
    for scenario in WeightScenario::ALL {
        let config = PipelineConfig {
            weight_scenario: scenario,
            ..PipelineConfig::default()
        };
        let out = run_risk_pipeline(&portfolio(), &config).unwrap();
        let (w_ai, w_flags) = scenario.weights();
        assert_eq!(w_ai + w_flags, Decimal::ONE);
        for r in &out.result.records {
            let s = &r.scores;
            assert_eq!(
                s.liquidity_risk_score,
                w_ai * s.ai_anomaly_score + w_flags * s.flag_score
            );
            assert_eq!(
                s.risk_bucket,
                scoring::assign_bucket(s.liquidity_risk_score, BucketBoundary::Inclusive)
            );
        }
    }
}

#[test]
fn test_anomaly_scores_span_batch() {
    for signal in [AnomalySignal::Label, AnomalySignal::Score] {
        let mut config = PipelineConfig::default();
        config.anomaly.signal = signal;
        let out = run_risk_pipeline(&portfolio(), &config).unwrap();
        let scores: Vec<Decimal> = out
            .result
            .records
            .iter()
            .map(|r| r.scores.ai_anomaly_score)
            .collect();
        assert_eq!(scores.iter().min().copied(), Some(Decimal::ZERO));
        assert_eq!(scores.iter().max().copied(), Some(dec!(100)));
    }
}

#[test]
fn test_label_signal_is_binary() {
    let out = run_risk_pipeline(&portfolio(), &PipelineConfig::default()).unwrap();
    for r in &out.result.records {
        let ai = r.scores.ai_anomaly_score;
        assert!(ai == Decimal::ZERO || ai == dec!(100), "unexpected score {ai}");
    }
}

#[test]
fn test_identical_rows_fall_back_to_zero() {
    let csv = "\
Company,Year,TotalCurrentAssets,TotalCurrentLiabilities,Cash,Receivables,TradePayables,ShortTermBorrowings,CFO,Sales,NetProfit
A,2022,200,100,50,150,100,50,10,500,50
B,2022,200,100,50,150,100,50,10,500,50
C,2022,200,100,50,150,100,50,10,500,50
";
    let table = table_io::read_table(csv.as_bytes()).unwrap();
    let out = run_risk_pipeline(&table, &PipelineConfig::default()).unwrap();
    for r in &out.result.records {
        assert_eq!(r.scores.ai_anomaly_score, Decimal::ZERO);
        // 0.4 * 33
        assert_eq!(r.scores.liquidity_risk_score, dec!(13.2));
        assert_eq!(r.scores.risk_bucket, RiskBucket::Low);
    }
}

// ===========================================================================
// Summary
// ===========================================================================

#[test]
fn test_portfolio_summary() {
    let out = run_risk_pipeline(&portfolio(), &PipelineConfig::default()).unwrap();
    let s = &out.result.summary;

    assert_eq!(s.companies_analyzed, 4);
    assert_eq!(s.firm_years, 8);
    assert_eq!(
        s.high_risk_firm_years + s.medium_risk_firm_years + s.low_risk_firm_years,
        8
    );
    assert_eq!(s.flagged_firm_years, 2);
    assert!((1..=2).contains(&s.model_outliers));

    let years: Vec<i32> = s.mean_score_by_year.iter().map(|y| y.year).collect();
    assert_eq!(years, vec![2022, 2023]);
    let expected_2022: Decimal = out.result.records[..]
        .iter()
        .filter(|r| r.record.year == 2022)
        .map(|r| r.scores.liquidity_risk_score)
        .sum::<Decimal>()
        / dec!(4);
    assert_eq!(s.mean_score_by_year[0].mean_risk_score, expected_2022);
    assert_eq!(s.mean_score_by_year[0].firm_years, 4);
}

// ===========================================================================
// Output file
// ===========================================================================

#[test]
fn test_output_file_round_trip() {
    let source = portfolio();
    let out = run_risk_pipeline(&source, &PipelineConfig::default()).unwrap();
    let augmented = table_io::augment_table(&source, &out.result.records).unwrap();

    let mut buffer: Vec<u8> = Vec::new();
    table_io::write_table(&augmented, &mut buffer).unwrap();
    let reread = table_io::read_table(buffer.as_slice()).unwrap();

    assert_eq!(reread, augmented);
    assert_eq!(&reread.headers[..12], &source.headers[..]);
    assert_eq!(&reread.headers[12..], &DERIVED_COLUMNS[..]);

    let parse = |s: String| -> Option<Decimal> { s.parse().ok() };
    for (i, r) in out.result.records.iter().enumerate() {
        assert_eq!(parse(cell(&reread, i, "CR")), r.ratios.cr);
        assert_eq!(parse(cell(&reread, i, "TACR")), r.ratios.tacr);
        assert_eq!(parse(cell(&reread, i, "DSO")), r.ratios.dso);
        assert_eq!(parse(cell(&reread, i, "CFO_to_PAT")), r.ratios.cfo_to_pat);
        assert_eq!(parse(cell(&reread, i, "CFO_margin")), r.ratios.cfo_margin);
        assert_eq!(
            parse(cell(&reread, i, "AI_Anomaly_Score")),
            Some(r.scores.ai_anomaly_score)
        );
        assert_eq!(
            parse(cell(&reread, i, "Liquidity_Risk_Score")),
            Some(r.scores.liquidity_risk_score)
        );
        assert_eq!(cell(&reread, i, "Flag_Count"), r.flags.flag_count.to_string());
        assert_eq!(cell(&reread, i, "Risk_Bucket"), r.scores.risk_bucket.to_string());
    }

    // Undefined ratios are written as empty cells; extra columns survive
    assert_eq!(cell(&reread, 7, "CR"), "");
    assert_eq!(cell(&reread, 7, "Sector"), "Trading");
}

#[test]
fn test_workbook_round_trip() {
    let source = portfolio();
    let out = run_risk_pipeline(&source, &PipelineConfig::default()).unwrap();
    let augmented = table_io::augment_table(&source, &out.result.records).unwrap();

    let mut buffer: Vec<u8> = Vec::new();
    table_io::write_xlsx(&augmented, &mut buffer).unwrap();
    let reread = table_io::read_xlsx(Cursor::new(buffer)).unwrap();

    assert_eq!(reread.headers, augmented.headers);
    assert_eq!(reread.len(), 8);
    for i in 0..reread.len() {
        for column in ["Company", "Year", "Sector", "Flag_Count", "Risk_Bucket"] {
            assert_eq!(cell(&reread, i, column), cell(&augmented, i, column));
        }
        for column in ["CR", "DSO", "Liquidity_Risk_Score"] {
            let written: Option<Decimal> = cell(&augmented, i, column).parse().ok();
            let read: Option<Decimal> = cell(&reread, i, column).parse().ok();
            match (written, read) {
                (Some(w), Some(r)) => {
                    assert!((w - r).abs() < dec!(0.000000001), "{column} row {i}")
                }
                (w, r) => assert_eq!(w, r),
            }
        }
    }
    assert_eq!(cell(&reread, 7, "CR"), "");

    // The workbook feeds the pipeline like the CSV it came from
    let rescored = run_risk_pipeline(&reread, &PipelineConfig::default()).unwrap();
    assert_eq!(rescored.result.summary.flagged_firm_years, 2);
}

#[test]
fn test_table_format_follows_extension() {
    assert_eq!(TableFormat::from_path(Path::new("upload.xlsx")), TableFormat::Xlsx);
    assert_eq!(TableFormat::from_path(Path::new("UPLOAD.XLSX")), TableFormat::Xlsx);
    assert_eq!(TableFormat::from_path(Path::new("upload.csv")), TableFormat::Csv);
    assert_eq!(TableFormat::from_path(Path::new("upload")), TableFormat::Csv);
}

#[test]
fn test_reupload_replaces_derived_columns() {
    let source = portfolio();
    let out = run_risk_pipeline(&source, &PipelineConfig::default()).unwrap();
    let first = table_io::augment_table(&source, &out.result.records).unwrap();

    let again = run_risk_pipeline(&first, &PipelineConfig::default()).unwrap();
    let second = table_io::augment_table(&first, &again.result.records).unwrap();

    assert_eq!(second.headers, first.headers);
    assert_eq!(second, first);
}

#[test]
fn test_missing_cfo_column_aborts_before_output() {
    let csv = "\
Company,Year,TotalCurrentAssets,TotalCurrentLiabilities,Cash,Receivables,TradePayables,ShortTermBorrowings,Sales,NetProfit
A,2022,200,100,50,150,100,50,500,50
";
    let table = table_io::read_table(csv.as_bytes()).unwrap();
    let err = run_risk_pipeline(&table, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.to_string(), "Missing required columns: CFO");
    match err {
        RiskError::MissingColumns { columns } => assert_eq!(columns, vec!["CFO".to_string()]),
        other => panic!("Expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn test_blank_rows_skipped_on_read() {
    let csv = format!("{PORTFOLIO_CSV},,,,,,,,,,,\n");
    let table = table_io::read_table(csv.as_bytes()).unwrap();
    assert_eq!(table.len(), 8);
}

#[test]
fn test_invalid_value_row_counts_blank_rows() {
    let csv = "\
Company,Year,TotalCurrentAssets,TotalCurrentLiabilities,Cash,Receivables,TradePayables,ShortTermBorrowings,CFO,Sales,NetProfit
A,2022,200,100,50,150,100,50,10,500,50
,,,,,,,,,,
B,2022,200,100,50,150,100,50,10,lots,50
";
    let table = table_io::read_table(csv.as_bytes()).unwrap();
    assert_eq!(table.len(), 2);
    match schema::parse_records(&table).unwrap_err() {
        RiskError::InvalidValue { row, column, .. } => {
            assert_eq!(row, 3);
            assert_eq!(column, "Sales");
        }
        other => panic!("Expected InvalidValue, got {other:?}"),
    }
}
