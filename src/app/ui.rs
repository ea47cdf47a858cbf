use chrono::{DateTime, Local};
use eframe::egui::{self, Align, Align2, Color32, RichText};
use rfd::FileDialog;

use super::{ExamDesk, MetricsView, NoticeLevel, Page};
use crate::dashboard::{Bucket, ExamType, MetricsSnapshot, Subject, ALL, MAX_SCORE};
use crate::registry::{SortDirection, SortField};
use crate::upload::{UploadStatus, MAX_FILE_SIZE};
use crate::utils::color::{self, progress_color, upload_status_color};
use crate::utils::file_size::FileSizeUtils;

enum WizardAction {
    GoTo(usize),
    Pick,
    Remove(usize),
    Clear,
    Back,
    Next,
    Submit,
    Close,
}

impl ExamDesk {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("navigation").show(ctx, |ui| {
            ui.add_space(6.0);
            self.render_navigation(ui);
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            self.render_footer(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match self.state.page {
                Page::Uploads => self.render_uploads(ui),
                Page::Metrics => self.render_metrics(ui),
            });
        });

        if self.state.wizard.is_open() {
            self.render_wizard(ctx);
        }
    }

    fn render_navigation(&mut self, ui: &mut egui::Ui) {
        let mut target = None;
        ui.horizontal(|ui| {
            ui.heading("Exam Desk");
            ui.add_space(20.0);
            for (page, label) in [(Page::Uploads, "📤 Uploads"), (Page::Metrics, "📊 Metrics")] {
                if ui.selectable_label(self.state.page == page, label).clicked() {
                    target = Some(page);
                }
            }

            ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                let (text, tint) = match self.state.backend_healthy {
                    Some(true) => ("● Backend online", color::success()),
                    Some(false) => ("● Backend unreachable", color::danger()),
                    None => ("● Checking backend…", color::muted()),
                };
                ui.colored_label(tint, text);
            });
        });

        if let Some(page) = target {
            self.show_page(page);
        }
    }

    fn render_uploads(&mut self, ui: &mut egui::Ui) {
        let mut open_wizard = false;
        let mut refresh = false;

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.heading("Tests");
                ui.label(
                    RichText::new("Upload answer keys and response sheets for grading")
                        .color(ui.visuals().text_color().gamma_multiply(0.7)),
                );
            });
            ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                let button = egui::Button::new(RichText::new("📤 Upload Test").color(Color32::WHITE))
                    .fill(color::accent())
                    .min_size(egui::vec2(140.0, 32.0));
                if ui.add(button).clicked() {
                    open_wizard = true;
                }
                if ui.button("🔄 Refresh").clicked() {
                    refresh = true;
                }
            });
        });
        ui.add_space(12.0);

        if !self.state.initial_load_done {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading tests...");
            });
        } else if self.state.registry.records().is_empty() {
            ui.group(|ui| {
                ui.set_min_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.add_space(20.0);
                    ui.label(RichText::new("No tests uploaded yet").strong());
                    if let Some(error) = self.state.registry.last_error() {
                        ui.colored_label(color::danger(), error.to_string());
                    }
                    ui.add_space(8.0);
                    if ui.button("Upload First Test").clicked() {
                        open_wizard = true;
                    }
                    ui.add_space(20.0);
                });
            });
        } else {
            self.render_tests_table(ui);
        }

        let status = self.state.get_status_text();
        if !status.is_empty() {
            ui.add_space(8.0);
            ui.label(RichText::new(status).small());
        }

        if refresh {
            self.refresh_tests(crate::registry::RefreshReason::Manual);
        }
        if open_wizard {
            self.open_wizard();
        }
    }

    fn render_tests_table(&mut self, ui: &mut egui::Ui) {
        let sort = self.state.sort;
        let mut clicked = None;
        let columns = [
            (Some(SortField::TestNumber), "Test #"),
            (None, "Title"),
            (None, "Subject"),
            (None, "Uploaded by"),
            (Some(SortField::CreatedAt), "Created"),
            (Some(SortField::Progress), "Progress"),
        ];

        egui::Grid::new("tests_table")
            .striped(true)
            .num_columns(columns.len())
            .spacing([16.0, 8.0])
            .show(ui, |ui| {
                for (field, title) in columns {
                    match field {
                        Some(field) => {
                            let arrow = match (sort.field == field, sort.direction) {
                                (true, SortDirection::Ascending) => " ⬆",
                                (true, SortDirection::Descending) => " ⬇",
                                (false, _) => "",
                            };
                            let header = RichText::new(format!("{}{}", title, arrow)).strong();
                            if ui.add(egui::Button::new(header).frame(false)).clicked() {
                                clicked = Some(field);
                            }
                        }
                        None => {
                            ui.label(RichText::new(title).strong());
                        }
                    }
                }
                ui.end_row();

                for record in self.state.registry.sorted(sort) {
                    ui.label(record.test_number.to_string());
                    ui.label(record.title.as_str());
                    ui.label(record.subject.as_str());
                    ui.label(record.uploaded_by.as_str());
                    ui.label(display_date(&record.created_at));
                    ui.colored_label(progress_color(&record.progress), record.progress.label());
                    ui.end_row();
                }
            });

        if let Some(field) = clicked {
            self.toggle_sort(field);
        }
    }

    fn render_wizard(&mut self, ctx: &egui::Context) {
        let (Some(step), Some(slot)) = (self.state.wizard.step(), self.state.wizard.current_slot().cloned())
        else {
            return;
        };
        let titles: Vec<&'static str> = self.state.wizard.slots().iter().map(|s| s.label).collect();
        let uploading = self.state.is_uploading();
        let is_last = self.state.wizard.is_last_step();
        let submit_enabled = self.state.submit_enabled();
        let percent = self.state.wizard.progress_percent(&self.state.store);
        let files = self.state.store.get(slot.key).to_vec();
        let slot_error = self.state.slot_errors.get(&slot.key).cloned();
        let status = self.state.slot_status(slot.key);
        let upload_error = self.state.orchestrator.last_error().map(str::to_string);
        let hovering = ctx.input(|i| !i.raw.hovered_files.is_empty());

        let mut action = None;
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            action = Some(WizardAction::Close);
        }

        egui::Window::new("Upload Test")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .default_width(460.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("Step {} of {}", step + 1, titles.len())).color(color::muted()),
                    );
                    ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                        if ui.add_enabled(!uploading, egui::Button::new("✖")).clicked() {
                            action = Some(WizardAction::Close);
                        }
                    });
                });

                ui.horizontal(|ui| {
                    for (index, title) in titles.iter().enumerate() {
                        let done = index < step;
                        let text = if done {
                            RichText::new(format!("✔ {}", title)).color(color::success())
                        } else if index == step {
                            RichText::new(format!("{}. {}", index + 1, title))
                                .strong()
                                .color(color::accent())
                        } else {
                            RichText::new(format!("{}. {}", index + 1, title)).color(color::muted())
                        };
                        let button = egui::Button::new(text).frame(false);
                        if ui.add_enabled(done && !uploading, button).clicked() {
                            action = Some(WizardAction::GoTo(index));
                        }
                    }
                });

                ui.add(
                    egui::ProgressBar::new(f32::from(percent) / 100.0)
                        .show_percentage()
                        .fill(color::accent()),
                );
                ui.add_space(10.0);

                ui.heading(slot.action_text);
                ui.label(RichText::new(slot.description).color(color::muted()));
                ui.add_space(8.0);

                ui.group(|ui| {
                    ui.set_min_width(ui.available_width());
                    ui.vertical_centered(|ui| {
                        ui.add_space(10.0);
                        ui.label(if hovering {
                            "Release to add the file"
                        } else {
                            "Drag a file here, or"
                        });
                        let label = if slot.multi {
                            "📁 Choose Files"
                        } else {
                            "📁 Choose File"
                        };
                        if ui.add_enabled(!uploading, egui::Button::new(label)).clicked() {
                            action = Some(WizardAction::Pick);
                        }
                        ui.label(
                            RichText::new(format!(
                                "Accepted: {} · up to {}",
                                slot.accept,
                                FileSizeUtils::format_size(MAX_FILE_SIZE)
                            ))
                            .small()
                            .color(color::muted()),
                        );
                        ui.add_space(10.0);
                    });
                });

                for (index, file) in files.iter().enumerate() {
                    ui.horizontal(|ui| {
                        ui.label("📄");
                        ui.label(file.name.as_str());
                        ui.label(RichText::new(FileSizeUtils::format_size(file.size)).color(color::muted()));
                        ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                            let remove = ui
                                .add_enabled(!uploading, egui::Button::new("🗑"))
                                .on_hover_text("Remove file");
                            if remove.clicked() {
                                action = Some(WizardAction::Remove(index));
                            }
                        });
                    });
                }

                if files.len() > 1 && ui.add_enabled(!uploading, egui::Button::new("Clear all")).clicked() {
                    action = Some(WizardAction::Clear);
                }

                if let Some(error) = &slot_error {
                    ui.colored_label(color::danger(), error);
                }

                match status {
                    UploadStatus::Uploading => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.colored_label(upload_status_color(status), "Uploading...");
                        });
                    }
                    UploadStatus::Uploaded => {
                        ui.colored_label(upload_status_color(status), "✅ Uploaded");
                    }
                    UploadStatus::Error => {
                        let text = match &upload_error {
                            Some(error) => format!("❌ Upload failed: {}", error),
                            None => "❌ Upload failed".to_string(),
                        };
                        ui.colored_label(upload_status_color(status), text);
                    }
                    UploadStatus::Idle => {}
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(step > 0 && !uploading, egui::Button::new("⬅ Back"))
                        .clicked()
                    {
                        action = Some(WizardAction::Back);
                    }
                    ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                        if is_last {
                            let label = if uploading { "Uploading..." } else { "📤 Submit All" };
                            let button = egui::Button::new(RichText::new(label).color(Color32::WHITE))
                                .fill(color::accent());
                            if ui.add_enabled(submit_enabled, button).clicked() {
                                action = Some(WizardAction::Submit);
                            }
                        } else if ui.button("Next ➡").clicked() {
                            action = Some(WizardAction::Next);
                        }
                    });
                });
            });

        match action {
            Some(WizardAction::GoTo(index)) => self.go_to_step(index),
            Some(WizardAction::Pick) => self.pick_files(slot.accept, slot.multi),
            Some(WizardAction::Remove(index)) => self.remove_file(slot.key, index),
            Some(WizardAction::Clear) => self.clear_slot(),
            Some(WizardAction::Back) => self.previous_step(),
            Some(WizardAction::Next) => self.next_step(),
            Some(WizardAction::Submit) => self.submit(),
            Some(WizardAction::Close) => self.close_wizard(),
            None => {}
        }
    }

    fn pick_files(&mut self, accept: &str, multi: bool) {
        let extensions: Vec<&str> = accept
            .split(',')
            .filter_map(|entry| entry.trim().strip_prefix('.'))
            .collect();
        let mut dialog = FileDialog::new();
        if !extensions.is_empty() {
            dialog = dialog.add_filter("Accepted files", &extensions);
        }

        if multi {
            for path in dialog.pick_files().unwrap_or_default() {
                self.add_path(path);
            }
        } else if let Some(path) = dialog.pick_file() {
            self.add_path(path);
        }
    }

    fn render_metrics(&mut self, ui: &mut egui::Ui) {
        let mut apply = false;
        let mut reset = false;
        let mut export = false;

        ui.add_space(10.0);
        ui.heading("Performance Metrics");
        ui.add_space(8.0);

        ui.group(|ui| {
            let filter = &mut self.state.filter;
            egui::Grid::new("metrics_filters")
                .num_columns(4)
                .spacing([12.0, 6.0])
                .show(ui, |ui| {
                    ui.label("Institution");
                    ui.text_edit_singleline(&mut filter.institution);
                    ui.label("Batch");
                    ui.text_edit_singleline(&mut filter.batch);
                    ui.end_row();

                    ui.label("Class");
                    ui.text_edit_singleline(&mut filter.student_class);
                    ui.label("Section");
                    ui.text_edit_singleline(&mut filter.section);
                    ui.end_row();

                    ui.label("Exam type");
                    egui::ComboBox::from_id_source("exam_type")
                        .selected_text(filter.exam_type.as_str())
                        .show_ui(ui, |ui| {
                            for exam_type in ExamType::ALL {
                                ui.selectable_value(&mut filter.exam_type, exam_type, exam_type.as_str());
                            }
                        });
                    ui.label("Subject");
                    egui::ComboBox::from_id_source("subject")
                        .selected_text(filter.subject.map_or(ALL, |s| s.as_str()))
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut filter.subject, None, ALL);
                            for subject in Subject::ALL {
                                ui.selectable_value(&mut filter.subject, Some(subject), subject.as_str());
                            }
                        });
                    ui.end_row();

                    ui.label("From");
                    ui.text_edit_singleline(&mut self.state.date_inputs.0);
                    ui.label("To");
                    ui.text_edit_singleline(&mut self.state.date_inputs.1);
                    ui.end_row();

                    ui.label("Score");
                    ui.horizontal(|ui| {
                        ui.add(egui::DragValue::new(&mut filter.score_range.0).clamp_range(0..=MAX_SCORE));
                        ui.label("to");
                        ui.add(egui::DragValue::new(&mut filter.score_range.1).clamp_range(0..=MAX_SCORE));
                    });
                    ui.end_row();
                });
            if filter.score_range.0 > filter.score_range.1 {
                filter.score_range.1 = filter.score_range.0;
            }

            ui.horizontal(|ui| {
                if ui.button("🔍 Apply").clicked() {
                    apply = true;
                }
                if ui.button("↺ Reset").clicked() {
                    reset = true;
                }
                if ui.button("💾 Export JSON").clicked() {
                    export = true;
                }
            });
        });
        ui.add_space(12.0);

        match &self.state.metrics {
            MetricsView::NotLoaded => {
                ui.label("Choose filters and press Apply.");
            }
            MetricsView::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading metrics...");
                });
            }
            MetricsView::Unavailable => {
                ui.colored_label(
                    color::warning(),
                    "Metrics need a live backend. Unset EXAM_DESK_MOCK to load them.",
                );
            }
            MetricsView::Failed(error) => {
                ui.colored_label(color::danger(), format!("Could not load metrics: {}", error));
            }
            MetricsView::Loaded(snapshot) => render_snapshot(ui, snapshot),
        }

        if reset {
            self.reset_filter();
        } else if apply {
            self.load_metrics();
        } else if export {
            let target = FileDialog::new()
                .add_filter("JSON", &["json"])
                .set_file_name("dashboard-metrics.json")
                .save_file();
            if let Some(path) = target {
                self.export_metrics(path);
            }
        }
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        ui.add_space(4.0);
        if self.state.notices.is_empty() {
            ui.label(RichText::new("Ready").small().color(color::muted()));
        }
        for notice in self.state.notices.iter().rev().take(3) {
            let tint = match notice.level {
                NoticeLevel::Success => color::success(),
                NoticeLevel::Warning => color::warning(),
                NoticeLevel::Error => color::danger(),
            };
            ui.colored_label(tint, notice.text.as_str());
        }
        ui.add_space(4.0);
    }
}

fn render_snapshot(ui: &mut egui::Ui, snapshot: &MetricsSnapshot) {
    let cards = &snapshot.cards;
    ui.group(|ui| {
        egui::Grid::new("metric_cards")
            .num_columns(2)
            .spacing([24.0, 6.0])
            .show(ui, |ui| {
                let rows = [
                    ("Tests conducted", cards.total_tests_conducted.to_string()),
                    ("Average accuracy", format!("{:.1}%", cards.average_accuracy_percent)),
                    ("Average score", format!("{:.1}", cards.average_total_score)),
                    ("Attempt rate", format!("{:.1}%", cards.average_attempt_rate_percent)),
                    ("Top 10 average", format!("{:.1}", cards.top_10_avg_score)),
                    ("Bottom 10 average", format!("{:.1}", cards.bottom_10_avg_score)),
                ];
                for (label, value) in rows {
                    ui.label(label);
                    ui.label(RichText::new(value).strong());
                    ui.end_row();
                }
            });
    });

    ui.add_space(8.0);
    ui.label(RichText::new("NEET readiness").strong());
    let readiness = snapshot.readiness.percentage_above_cutoff;
    ui.add(
        egui::ProgressBar::new((readiness / 100.0).clamp(0.0, 1.0) as f32)
            .text(format!("{:.1}% above 550", readiness))
            .fill(color::accent()),
    );

    ui.add_space(8.0);
    ui.label(RichText::new("Risk breakdown").strong());
    let risk = &snapshot.risk;
    bucket_row(ui, "Safe", &risk.safe, color::success());
    bucket_row(ui, "Medium risk", &risk.medium_risk, color::warning());
    bucket_row(ui, "At risk", &risk.at_risk, color::danger());
    ui.label(
        RichText::new(format!("{} students considered", risk.total_students_considered))
            .small()
            .color(color::muted()),
    );

    ui.add_space(8.0);
    ui.label(RichText::new("Score distribution").strong());
    for (label, bucket) in snapshot.distribution.rows() {
        bucket_row(ui, label, bucket, color::accent());
    }

    ui.add_space(8.0);
    json_section(ui, "Overall performance", &snapshot.overall);
    json_section(ui, "Trend", &snapshot.trend);
}

fn json_section(ui: &mut egui::Ui, title: &str, value: &serde_json::Value) {
    egui::CollapsingHeader::new(title).show(ui, |ui| {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        ui.label(RichText::new(text).monospace());
    });
}

fn bucket_row(ui: &mut egui::Ui, label: &str, bucket: &Bucket, tint: Color32) {
    ui.horizontal(|ui| {
        ui.add_sized([110.0, 18.0], egui::Label::new(label));
        ui.add(
            egui::ProgressBar::new((bucket.percentage / 100.0).clamp(0.0, 1.0) as f32)
                .desired_width(220.0)
                .text(format!("{} ({:.1}%)", bucket.count, bucket.percentage))
                .fill(tint),
        );
    });
}

fn display_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_rfc3339_dates_are_shown_verbatim() {
        assert_eq!(display_date("2026-01-02"), "2026-01-02");
        assert_eq!(display_date(""), "");
    }
}
