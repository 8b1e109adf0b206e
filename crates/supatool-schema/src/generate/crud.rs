//! supabase-js CRUD helpers, one TypeScript module per table.

use super::GeneratedFile;
use crate::model::Model;
use heck::ToUpperCamelCase;
use std::path::Path;

const CRUD_TEMPLATE: &str = r#"// Generated CRUD functions for __TABLE__

import { supabase } from '../client';
import type { __TABLE__ } from '../types';

type FilterValue = string | number | boolean | null;
type Filters = Record<string, FilterValue | FilterValue[]>;

/** Fetch every row. */
export async function select__NAME__Rows(): Promise<__TABLE__[]> {
  const { data, error } = await supabase.from('__TABLE__').select('*');
  if (error) {
    console.error('Error fetching all __TABLE__:', error);
    throw new Error(`Failed to fetch __TABLE__: ${error.message}`);
  }
  return (data ?? []) as __TABLE__[];
}

/** Fetch one row by id, or null when it does not exist. */
export async function select__NAME__RowById({ id }: { id: string }): Promise<__TABLE__ | null> {
  if (!id) {
    throw new Error('ID is required');
  }
  const { data, error } = await supabase.from('__TABLE__').select('*').eq('id', id).single();
  if (error) {
    if (error.code === 'PGRST116') {
      return null;
    }
    console.error('Error fetching __TABLE__ by ID:', error);
    throw new Error(`Failed to fetch __TABLE__ with ID ${id}: ${error.message}`);
  }
  return data as __TABLE__ | null;
}

/** Fetch rows matching every filter. Array values match any element. */
export async function select__NAME__RowsWithFilters({ filters }: { filters: Filters }): Promise<__TABLE__[]> {
  if (!filters || typeof filters !== 'object') return [];
  let query = supabase.from('__TABLE__').select('*');
  for (const [key, value] of Object.entries(filters)) {
    query = Array.isArray(value) ? query.in(key, value) : query.eq(key, value);
  }
  const { data, error } = await query;
  if (error) {
    console.error('Error fetching __TABLE__ by filters:', error);
    throw new Error(`Failed to fetch __TABLE__: ${error.message}`);
  }
  return (data as unknown as __TABLE__[]) || [];
}

/** Insert one row and return it. */
export async function insert__NAME__Row({ data }: { data: Omit<__TABLE__, 'id' | 'created_at' | 'updated_at'> }): Promise<__TABLE__> {
  if (!data) {
    throw new Error('Data is required for creation');
  }
  const { data: created, error } = await supabase.from('__TABLE__').insert([data]).select().single();
  if (error) {
    console.error('Error creating __TABLE__:', error);
    throw new Error(`Failed to create __TABLE__: ${error.message}`);
  }
  if (!created) {
    throw new Error('No data returned after creation');
  }
  return created as __TABLE__;
}

/** Update one row by id and return it. */
export async function update__NAME__Row({ id, data }: { id: string; data: Partial<Omit<__TABLE__, 'id' | 'created_at'>> }): Promise<__TABLE__> {
  if (!id) {
    throw new Error('ID is required for update');
  }
  if (!data || Object.keys(data).length === 0) {
    throw new Error('Update data is required');
  }
  const { data: updated, error } = await supabase.from('__TABLE__').update(data).eq('id', id).select().single();
  if (error) {
    if (error.code === 'PGRST116') {
      throw new Error(`__TABLE__ with ID ${id} not found`);
    }
    console.error('Error updating __TABLE__:', error);
    throw new Error(`Failed to update __TABLE__ with ID ${id}: ${error.message}`);
  }
  if (!updated) {
    throw new Error(`__TABLE__ with ID ${id} not found`);
  }
  return updated as __TABLE__;
}

/** Delete one row by id. */
export async function delete__NAME__Row({ id }: { id: string }): Promise<boolean> {
  if (!id) {
    throw new Error('ID is required for deletion');
  }
  const { error } = await supabase.from('__TABLE__').delete().eq('id', id);
  if (error) {
    console.error('Error deleting __TABLE__:', error);
    throw new Error(`Failed to delete __TABLE__ with ID ${id}: ${error.message}`);
  }
  return true;
}
"#;

pub fn render_crud(table: &str) -> String {
    CRUD_TEMPLATE
        .replace("__NAME__", &table.to_upper_camel_case())
        .replace("__TABLE__", table)
}

/// `<out_dir>/<table>.ts` for every created table.
pub fn generate_crud(model: &Model, out_dir: &Path) -> Vec<GeneratedFile> {
    model
        .created_tables()
        .map(|(name, _)| GeneratedFile {
            path: out_dir.join(format!("{name}.ts")),
            content: render_crud(name),
        })
        .collect()
}
